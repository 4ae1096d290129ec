use block_io::DiskError;

/// Internal failures: disk I/O, a corrupt superblock, or a broken channel.
/// Per-operation outcomes the wire protocol defines (reuse mismatch, parent
/// full, and so on) are not modeled here — they are valid replies, not
/// Rust errors, and flow back as ordinary `Ok` values from `server::fs`.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error(transparent)]
    Disk(#[from] DiskError),
    #[error("corrupt fs header: {0}")]
    CorruptHeader(String),
    #[error("channel I/O error: {0}")]
    Channel(#[from] std::io::Error),
    #[error("malformed request: {0}")]
    Wire(#[from] wire::WireError),
}
