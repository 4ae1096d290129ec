//! Shared direct/indirect block-pointer resolution, used by both the
//! directory algorithm and the file read/write algorithm: a directory's
//! data is addressed exactly the same way a regular file's is
//! (`spec.md` §4.4, §4.6, §4.7).

use block_io::SectorDevice;
use fs_types::{RawInode, NUM_DIRECT};

use crate::context::ServerContext;
use crate::error::FsError;

/// Resolves the block number holding logical block `outer` of `inode`.
/// Returns `0` for a hole (unallocated block) rather than erroring.
pub(crate) fn resolve_block_read<D: SectorDevice>(
    ctx: &mut ServerContext<D>,
    inode: &RawInode,
    outer: usize,
) -> Result<u32, FsError> {
    if outer < NUM_DIRECT {
        return Ok(inode.direct[outer]);
    }
    if inode.indirect == 0 {
        return Ok(0);
    }
    let idx = outer - NUM_DIRECT;
    let block = ctx.block(u64::from(inode.indirect))?;
    let off = idx * 4;
    Ok(u32::from_ne_bytes(block[off..off + 4].try_into().unwrap()))
}

/// Installs `block_no` as the pointer for logical block `outer`. The
/// indirect block itself must already be allocated if `outer >=
/// NUM_DIRECT`.
pub(crate) fn set_block_ptr<D: SectorDevice>(
    ctx: &mut ServerContext<D>,
    inode: &mut RawInode,
    outer: usize,
    block_no: u32,
) -> Result<(), FsError> {
    if outer < NUM_DIRECT {
        inode.direct[outer] = block_no;
        return Ok(());
    }
    let idx = outer - NUM_DIRECT;
    let indirect = inode.indirect;
    let block = ctx.block_mut(u64::from(indirect))?;
    let off = idx * 4;
    block[off..off + 4].copy_from_slice(&block_no.to_ne_bytes());
    ctx.mark_block_dirty(u64::from(indirect));
    Ok(())
}

/// Zeroes a freshly allocated data block and marks it dirty.
pub(crate) fn zero_block<D: SectorDevice>(ctx: &mut ServerContext<D>, block_no: u32) -> Result<(), FsError> {
    let block = ctx.block_mut(u64::from(block_no))?;
    block.fill(0);
    ctx.mark_block_dirty(u64::from(block_no));
    Ok(())
}
