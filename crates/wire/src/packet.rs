use dataview::{DataView, Pod, PodMethods as _};
use fs_types::DIRNAMELEN;

/// Total size of one wire packet, matching the original protocol's fixed
/// 48-byte message (`spec.md` §6).
pub const PACKET_SIZE: usize = 48;

pub type RawPacket = [u8; PACKET_SIZE];

pub(crate) const FILE_PACKET_RESERVED: usize = PACKET_SIZE - 20;

/// File-metadata shaped packet: the reply to `GET_FILE`, `SEARCH_FILE`,
/// `CREATE_FILE` and `CREATE_DIR`.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct RawFilePacket {
    pub opcode: u16,
    pub _pad: u16,
    pub inum: u32,
    pub ty: i16,
    pub nlink: i16,
    pub size: u32,
    pub reuse: u32,
    pub _reserved: [u8; FILE_PACKET_RESERVED],
}

impl RawFilePacket {
    /// Copies `buf` into a `Self`. A stack-allocated `RawPacket` off the
    /// channel has no alignment guarantee, so this reads through
    /// `DataView::read` (an unaligned copy) rather than reinterpreting the
    /// bytes in place.
    #[must_use]
    pub fn from_bytes(buf: &RawPacket) -> Self {
        DataView::from(buf.as_slice()).read::<Self>(0)
    }

    #[must_use]
    pub fn into_bytes(self) -> RawPacket {
        let mut out = [0u8; PACKET_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

/// Generic argument-shaped packet used for requests and for the
/// `arg1`/`Ack` replies.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct RawDataPacket {
    pub opcode: u16,
    pub _pad: u16,
    pub arg1: u32,
    pub arg2: u32,
    pub arg3: u32,
    pub arg4: u32,
    pub name: [u8; DIRNAMELEN],
}

impl RawDataPacket {
    /// Copies `buf` into a `Self`; see [`RawFilePacket::from_bytes`] for why
    /// this reads through `DataView::read` instead of reinterpreting.
    #[must_use]
    pub fn from_bytes(buf: &RawPacket) -> Self {
        DataView::from(buf.as_slice()).read::<Self>(0)
    }

    #[must_use]
    pub fn into_bytes(self) -> RawPacket {
        let mut out = [0u8; PACKET_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

/// A decoded file-metadata reply, independent of the wire layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRecord {
    pub inum: u32,
    pub ty: i16,
    pub nlink: i16,
    pub size: u32,
    pub reuse: u32,
}
