use std::io::{self, Cursor, Read, Write};
use std::os::unix::net::UnixStream;

use crate::packet::{RawPacket, PACKET_SIZE};

/// The message-passing transport between a client and the server
/// (`spec.md` §1, §2's "external collaborator").
///
/// `READ_FILE`/`WRITE_FILE` carry their bulk payload as the bytes
/// immediately following the fixed header on the same channel, rather than
/// as a pointer into a shared address space.
pub trait Channel {
    fn recv_header(&mut self) -> io::Result<RawPacket>;
    fn recv_payload(&mut self, len: usize) -> io::Result<Vec<u8>>;
    fn send_header(&mut self, packet: &RawPacket) -> io::Result<()>;
    fn send_payload(&mut self, data: &[u8]) -> io::Result<()>;
}

/// A real client/server connection over a Unix domain socket.
pub struct UnixChannel {
    stream: UnixStream,
}

impl UnixChannel {
    #[must_use]
    pub fn new(stream: UnixStream) -> Self {
        Self { stream }
    }
}

impl Channel for UnixChannel {
    fn recv_header(&mut self) -> io::Result<RawPacket> {
        let mut buf = [0u8; PACKET_SIZE];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn recv_payload(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn send_header(&mut self, packet: &RawPacket) -> io::Result<()> {
        self.stream.write_all(packet)
    }

    fn send_payload(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)
    }
}

/// An in-memory channel for tests: reads come from a preloaded buffer,
/// writes accumulate for later inspection.
pub struct PipeChannel {
    inbound: Cursor<Vec<u8>>,
    outbound: Vec<u8>,
}

impl PipeChannel {
    #[must_use]
    pub fn new(inbound: Vec<u8>) -> Self {
        Self { inbound: Cursor::new(inbound), outbound: Vec::new() }
    }

    #[must_use]
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }
}

impl Channel for PipeChannel {
    fn recv_header(&mut self) -> io::Result<RawPacket> {
        let mut buf = [0u8; PACKET_SIZE];
        self.inbound.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn recv_payload(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inbound.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn send_header(&mut self, packet: &RawPacket) -> io::Result<()> {
        self.outbound.extend_from_slice(packet);
        Ok(())
    }

    fn send_payload(&mut self, data: &[u8]) -> io::Result<()> {
        self.outbound.extend_from_slice(data);
        Ok(())
    }
}
