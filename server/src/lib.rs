//! The file-system server core: on-disk layout, two-level write-back
//! cache, free-list bookkeeping, directory/file operations, and the
//! request dispatcher (`spec.md` §1–§4).

pub mod context;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod freelist;

mod cache;
mod raw_inode;

pub use context::ServerContext;
pub use error::FsError;
