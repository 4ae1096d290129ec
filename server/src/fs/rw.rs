//! Read and write algorithms (`spec.md` §4.6, §4.7): holes, partial-block
//! prefixes/suffixes, admission-checked growth.

use block_io::SectorDevice;
use dataview::PodMethods as _;
use fs_types::{InodeNo, InodeType, NUM_DIRECT};

use crate::context::ServerContext;
use crate::error::FsError;
use crate::fs::blocks::{resolve_block_read, set_block_ptr, zero_block};

/// Reads up to `size` bytes starting at `pos` into `out` (cleared first),
/// returning the wire-level `arg1` value: bytes copied, or a negative
/// error code.
pub fn read_file<D: SectorDevice>(
    ctx: &mut ServerContext<D>,
    inum: InodeNo,
    pos: u32,
    size: u32,
    reuse: u32,
    out: &mut Vec<u8>,
) -> Result<i32, FsError> {
    out.clear();

    let inode = ctx.inode(inum)?;
    if inode.reuse != reuse {
        return Ok(-1);
    }
    if inode.inode_type() == InodeType::Free {
        return Ok(-2);
    }
    if pos >= inode.size {
        return Ok(0);
    }

    let size = size.min(inode.size - pos);
    if size == 0 {
        return Ok(0);
    }

    let sector_size = ctx.geometry.sector_size;
    let start = (pos / sector_size) as usize;
    let mut end = ((pos + size) / sector_size) as usize;
    if (pos + size) % sector_size == 0 {
        end -= 1;
    }

    let mut copied: u32 = 0;
    for outer in start..=end {
        let block_no = resolve_block_read(ctx, &inode, outer)?;
        let prefix = ((pos + copied) % sector_size) as usize;
        let copysize = if outer == end {
            (size - copied) as usize
        } else {
            sector_size as usize - prefix
        };

        if block_no == 0 {
            out.resize(out.len() + copysize, 0);
        } else {
            let block = ctx.block(u64::from(block_no))?;
            out.extend_from_slice(&block[prefix..prefix + copysize]);
        }
        copied += copysize as u32;
    }

    Ok(copied as i32)
}

/// Writes `data` (exactly `size` bytes) starting at `pos`, pre-checking
/// the free-block budget before mutating anything, returning the
/// wire-level `arg1` value.
pub fn write_file<D: SectorDevice>(
    ctx: &mut ServerContext<D>,
    inum: InodeNo,
    pos: u32,
    size: u32,
    reuse: u32,
    data: &[u8],
) -> Result<i32, FsError> {
    if u64::from(pos) + u64::from(size) > ctx.geometry.max_file_size {
        return Ok(-1);
    }

    let mut inode = ctx.inode(inum)?;
    if inode.inode_type() != InodeType::Regular {
        return Ok(-2);
    }
    if inode.reuse != reuse {
        return Ok(-3);
    }
    if size == 0 {
        return Ok(0);
    }

    let sector_size = ctx.geometry.sector_size;
    let start = (pos / sector_size) as usize;
    let end_byte = pos + size;
    let mut end = (end_byte / sector_size) as usize;
    if end_byte % sector_size == 0 {
        end -= 1;
    }

    let existing_block_count = inode.size.div_ceil(sector_size) as usize;
    let alloc_start = start.max(existing_block_count);

    // Admission check: count every block the allocation pass below will
    // actually allocate, including the indirect block if this write is the
    // one that first crosses the direct/indirect boundary.
    let mut extra_blocks = 0usize;
    if alloc_start <= end {
        extra_blocks = end - alloc_start + 1;
        if inode.indirect == 0 && (alloc_start..=end).contains(&NUM_DIRECT) {
            extra_blocks += 1;
        }
    }
    if ctx.free_blocks.len() <= extra_blocks {
        return Ok(-4);
    }

    // Allocation pass. Empty (a no-op) whenever `alloc_start > end`, i.e.
    // the write touches only blocks that already exist.
    for outer in alloc_start..=end {
        if outer == NUM_DIRECT && inode.indirect == 0 {
            let block_no = ctx.alloc_block();
            zero_block(ctx, block_no)?;
            inode.indirect = block_no;
        }
        let block_no = ctx.alloc_block();
        zero_block(ctx, block_no)?;
        set_block_ptr(ctx, &mut inode, outer, block_no)?;
    }

    // Copy pass.
    let mut copied: u32 = 0;
    for outer in start..=end {
        let prefix = ((pos + copied) % sector_size) as usize;
        let copysize = (sector_size as usize - prefix).min((size - copied) as usize);
        let block_no = resolve_block_read(ctx, &inode, outer)?;
        let block = ctx.block_mut(u64::from(block_no))?;
        block[prefix..prefix + copysize]
            .copy_from_slice(&data[copied as usize..copied as usize + copysize]);
        ctx.mark_block_dirty(u64::from(block_no));
        copied += copysize as u32;
    }

    let new_size = pos + copied;
    if new_size > inode.size {
        inode.size = new_size;
    }
    *ctx.inode_mut(inum)? = inode;
    ctx.mark_inode_dirty(inum);

    Ok(copied as i32)
}
