//! On-disk data types for the file system.
//!
//! The data layout:
//!
//! | sector       | content          | type             |
//! |--------------|------------------|------------------|
//! | 0            | boot sector      | (unused)         |
//! | 1            | fs header        | [`RawFsHeader`]  |
//! | 2..=N        | inode table      | [`RawInode`]     |
//! | N+1..        | data blocks      | raw bytes        |
//!
//! Inode and directory-entry layouts are fixed size regardless of sector
//! size; the number of inodes or directory entries that fit in one sector
//! is a runtime quantity derived from the header (see [`Geometry`]).

mod geometry;
mod ids;
mod repr;

pub use geometry::Geometry;
pub use ids::{BlockNo, InodeNo};
pub use repr::{InodeType, RawDirEntry, RawFsHeader, RawInode, DIRNAMELEN, NUM_DIRECT};

/// Inode number of the file system root directory.
pub const ROOT_INUM: u32 = 1;

/// Sector that holds the reserved boot block.
pub const BOOT_SECTOR: u64 = 0;

/// Sector that holds [`RawFsHeader`].
pub const HEADER_SECTOR: u64 = 1;
