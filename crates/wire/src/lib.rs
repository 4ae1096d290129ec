//! The client/server wire protocol from `spec.md` §6.
//!
//! Every request is a fixed-size packet carrying a 16-bit opcode plus one
//! of two payload shapes ([`RawFilePacket`], [`RawDataPacket`]), both the
//! same size so they can be viewed as a union of the same
//! `[u8; PACKET_SIZE]` buffer. The `pointer`-based cross-address-space copy
//! primitive from the original spec is realized here as "the payload bytes
//! for `READ_FILE`/`WRITE_FILE` follow the fixed header on the same
//! channel" (see [`Channel`]) — the natural adaptation of a pointer-based
//! microkernel IPC primitive onto a byte-stream transport.

mod channel;
mod opcode;
mod packet;

use arrayvec::ArrayVec;
use fs_types::DIRNAMELEN;

pub use channel::{Channel, PipeChannel, UnixChannel};
pub use opcode::Opcode;
pub use packet::{FileRecord, RawDataPacket, RawFilePacket, RawPacket, PACKET_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("name field is not validly NUL-padded")]
    InvalidName,
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Name = ArrayVec<u8, DIRNAMELEN>;

fn read_name(raw: &[u8; DIRNAMELEN]) -> Name {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let mut name = ArrayVec::new();
    name.try_extend_from_slice(&raw[..len]).expect("len <= DIRNAMELEN by construction");
    name
}

fn write_name(name: &[u8]) -> [u8; DIRNAMELEN] {
    let mut raw = [0u8; DIRNAMELEN];
    let len = name.len().min(DIRNAMELEN);
    raw[..len].copy_from_slice(&name[..len]);
    raw
}

/// A decoded client request.
#[derive(Debug, Clone)]
pub enum Request {
    GetFile { inum: u32 },
    SearchFile { parent_inum: u32, name: Name },
    CreateFile { parent_inum: u32, name: Name },
    /// `size` bytes follow on the channel as the read is serviced.
    ReadFile { inum: u32, pos: u32, size: u32, reuse: u32 },
    /// `size` bytes of write payload follow the header on the channel.
    WriteFile { inum: u32, pos: u32, size: u32, reuse: u32 },
    CreateDir { parent_inum: u32, name: Name },
    DeleteDir { target_inum: u32, parent_inum: u32 },
    Link { target_inum: u32, parent_inum: u32, name: Name },
    Unlink { target_inum: u32, parent_inum: u32 },
    Sync { shutdown: bool },
}

impl Request {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::GetFile { .. } => Opcode::GetFile,
            Self::SearchFile { .. } => Opcode::SearchFile,
            Self::CreateFile { .. } => Opcode::CreateFile,
            Self::ReadFile { .. } => Opcode::ReadFile,
            Self::WriteFile { .. } => Opcode::WriteFile,
            Self::CreateDir { .. } => Opcode::CreateDir,
            Self::DeleteDir { .. } => Opcode::DeleteDir,
            Self::Link { .. } => Opcode::Link,
            Self::Unlink { .. } => Opcode::Unlink,
            Self::Sync { .. } => Opcode::Sync,
        }
    }

    /// Decodes a request from its fixed-size header. `READ_FILE`/
    /// `WRITE_FILE` payload bytes are read separately by the caller via
    /// [`Channel`].
    pub fn decode(buf: &RawPacket) -> Result<Self, WireError> {
        let opcode_raw = u16::from_ne_bytes([buf[0], buf[1]]);
        let opcode = Opcode::from_raw(opcode_raw).ok_or(WireError::UnknownOpcode(opcode_raw))?;

        Ok(match opcode {
            Opcode::GetFile => {
                let p = RawDataPacket::from_bytes(buf);
                Self::GetFile { inum: p.arg1 }
            }
            Opcode::SearchFile => {
                let p = RawDataPacket::from_bytes(buf);
                Self::SearchFile { parent_inum: p.arg1, name: read_name(&p.name) }
            }
            Opcode::CreateFile => {
                let p = RawDataPacket::from_bytes(buf);
                Self::CreateFile { parent_inum: p.arg1, name: read_name(&p.name) }
            }
            Opcode::ReadFile => {
                let p = RawDataPacket::from_bytes(buf);
                Self::ReadFile { inum: p.arg1, pos: p.arg2, size: p.arg3, reuse: p.arg4 }
            }
            Opcode::WriteFile => {
                let p = RawDataPacket::from_bytes(buf);
                Self::WriteFile { inum: p.arg1, pos: p.arg2, size: p.arg3, reuse: p.arg4 }
            }
            Opcode::CreateDir => {
                let p = RawDataPacket::from_bytes(buf);
                Self::CreateDir { parent_inum: p.arg1, name: read_name(&p.name) }
            }
            Opcode::DeleteDir => {
                let p = RawDataPacket::from_bytes(buf);
                Self::DeleteDir { target_inum: p.arg1, parent_inum: p.arg2 }
            }
            Opcode::Link => {
                let p = RawDataPacket::from_bytes(buf);
                Self::Link { target_inum: p.arg1, parent_inum: p.arg2, name: read_name(&p.name) }
            }
            Opcode::Unlink => {
                let p = RawDataPacket::from_bytes(buf);
                Self::Unlink { target_inum: p.arg1, parent_inum: p.arg2 }
            }
            Opcode::Sync => {
                let p = RawDataPacket::from_bytes(buf);
                Self::Sync { shutdown: p.arg1 != 0 }
            }
        })
    }
}

/// A reply, always written back into the same packet slot the request
/// arrived in (`spec.md` §2, §6).
#[derive(Debug, Clone)]
pub enum Reply {
    /// `GET_FILE`/`SEARCH_FILE`/`CREATE_FILE`/`CREATE_DIR` success or
    /// `SEARCH_FILE`'s "not found" (`inum == 0`).
    File(FileRecord),
    /// `arg1`-shaped replies: bytes copied (`READ_FILE`/`WRITE_FILE`) or a
    /// small status code (`DELETE_DIR`/`LINK`/`UNLINK`), including
    /// negative error codes.
    Arg1(i32),
    /// `SYNC`'s fire-and-forget acknowledgement.
    Ack,
}

impl Reply {
    #[must_use]
    pub fn encode(&self, opcode: Opcode) -> RawPacket {
        match self {
            Self::File(record) => RawFilePacket {
                opcode: opcode as u16,
                _pad: 0,
                inum: record.inum,
                ty: record.ty,
                nlink: record.nlink,
                size: record.size,
                reuse: record.reuse,
                _reserved: [0; packet::FILE_PACKET_RESERVED],
            }
            .into_bytes(),
            Self::Arg1(value) => RawDataPacket {
                opcode: opcode as u16,
                _pad: 0,
                arg1: *value as u32,
                arg2: 0,
                arg3: 0,
                arg4: 0,
                name: [0; DIRNAMELEN],
            }
            .into_bytes(),
            Self::Ack => RawDataPacket {
                opcode: opcode as u16,
                _pad: 0,
                arg1: 0,
                arg2: 0,
                arg3: 0,
                arg4: 0,
                name: [0; DIRNAMELEN],
            }
            .into_bytes(),
        }
    }
}
