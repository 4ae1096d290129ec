//! Directory operations (`spec.md` §4.4): a directory's data is a sequence
//! of `dir_entry` records addressed the same way a file's data blocks are.

use std::mem::size_of;

use block_io::SectorDevice;
use dataview::PodMethods as _;
use fs_types::{InodeNo, RawDirEntry, NUM_DIRECT};

use crate::context::ServerContext;
use crate::error::FsError;
use crate::fs::blocks::{resolve_block_read, set_block_ptr, zero_block};

const ENTRY_SIZE: usize = size_of::<RawDirEntry>();

/// Whether `register` reused an existing vacant slot (parent metadata
/// unchanged) or appended a new one (parent's `size` grew).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    ParentUnchanged,
    ParentModified,
}

/// Linear scan for `name`; returns the matching inode number, or `0`.
pub fn search<D: SectorDevice>(ctx: &mut ServerContext<D>, dir_inum: InodeNo, name: &[u8]) -> Result<u32, FsError> {
    let inode = ctx.inode(dir_inum)?;
    let dir_entries_per_block = ctx.geometry.dir_entries_per_block as usize;
    let count = inode.size as usize / ENTRY_SIZE;

    for idx in 0..count {
        let outer = idx / dir_entries_per_block;
        let inner = idx % dir_entries_per_block;
        let block_no = resolve_block_read(ctx, &inode, outer)?;
        if block_no == 0 {
            continue;
        }
        let block = ctx.block(u64::from(block_no))?;
        let entry = *block[inner * ENTRY_SIZE..(inner + 1) * ENTRY_SIZE].as_data_view().get::<RawDirEntry>(0);
        if !entry.is_vacant() && entry.name_matches(name) {
            return Ok(entry.inum);
        }
    }
    Ok(0)
}

/// Reuses the first vacant slot if one exists; otherwise appends, growing
/// direct pointers and then the indirect block as needed.
pub fn register<D: SectorDevice>(
    ctx: &mut ServerContext<D>,
    dir_inum: InodeNo,
    new_inum: u32,
    name: &[u8],
) -> Result<RegisterOutcome, FsError> {
    let mut inode = ctx.inode(dir_inum)?;
    let dir_entries_per_block = ctx.geometry.dir_entries_per_block as usize;
    let count = inode.size as usize / ENTRY_SIZE;

    for idx in 0..count {
        let outer = idx / dir_entries_per_block;
        let inner = idx % dir_entries_per_block;
        let block_no = resolve_block_read(ctx, &inode, outer)?;
        if block_no == 0 {
            continue;
        }
        let is_vacant = {
            let block = ctx.block(u64::from(block_no))?;
            block[inner * ENTRY_SIZE..(inner + 1) * ENTRY_SIZE].as_data_view().get::<RawDirEntry>(0).is_vacant()
        };
        if is_vacant {
            let block = ctx.block_mut(u64::from(block_no))?;
            let slot = block[inner * ENTRY_SIZE..(inner + 1) * ENTRY_SIZE].as_data_view_mut().get_mut::<RawDirEntry>(0);
            slot.inum = new_inum;
            slot.set_name(name);
            ctx.mark_block_dirty(u64::from(block_no));
            return Ok(RegisterOutcome::ParentUnchanged);
        }
    }

    let idx = count;
    let outer = idx / dir_entries_per_block;
    let inner = idx % dir_entries_per_block;
    let direct_capacity_entries = NUM_DIRECT * dir_entries_per_block;

    if idx == direct_capacity_entries && inode.indirect == 0 {
        let block_no = ctx.alloc_block();
        zero_block(ctx, block_no)?;
        inode.indirect = block_no;
    }

    if inner == 0 {
        let block_no = ctx.alloc_block();
        zero_block(ctx, block_no)?;
        set_block_ptr(ctx, &mut inode, outer, block_no)?;
    }

    let block_no = resolve_block_read(ctx, &inode, outer)?;
    let block = ctx.block_mut(u64::from(block_no))?;
    let slot = block[inner * ENTRY_SIZE..(inner + 1) * ENTRY_SIZE].as_data_view_mut().get_mut::<RawDirEntry>(0);
    slot.inum = new_inum;
    slot.set_name(name);
    ctx.mark_block_dirty(u64::from(block_no));

    inode.size += ENTRY_SIZE as u32;
    *ctx.inode_mut(dir_inum)? = inode;
    ctx.mark_inode_dirty(dir_inum);

    Ok(RegisterOutcome::ParentModified)
}

/// Zeroes the first slot whose `inum` matches `target_inum`. Returns
/// whether a matching entry was found.
pub fn unregister<D: SectorDevice>(ctx: &mut ServerContext<D>, dir_inum: InodeNo, target_inum: u32) -> Result<bool, FsError> {
    let inode = ctx.inode(dir_inum)?;
    let dir_entries_per_block = ctx.geometry.dir_entries_per_block as usize;
    let count = inode.size as usize / ENTRY_SIZE;

    for idx in 0..count {
        let outer = idx / dir_entries_per_block;
        let inner = idx % dir_entries_per_block;
        let block_no = resolve_block_read(ctx, &inode, outer)?;
        if block_no == 0 {
            continue;
        }
        let block = ctx.block_mut(u64::from(block_no))?;
        let slot = block[inner * ENTRY_SIZE..(inner + 1) * ENTRY_SIZE].as_data_view_mut().get_mut::<RawDirEntry>(0);
        if !slot.is_vacant() && slot.inum == target_inum {
            slot.inum = 0;
            ctx.mark_block_dirty(u64::from(block_no));
            return Ok(true);
        }
    }
    Ok(false)
}

/// Trims trailing vacant slots, freeing whole trailing data blocks (and
/// the indirect block, if the trim reaches back past it). Never trims
/// past index 1, so "." survives.
pub fn clean_directory<D: SectorDevice>(ctx: &mut ServerContext<D>, dir_inum: InodeNo) -> Result<(), FsError> {
    let mut inode = ctx.inode(dir_inum)?;
    let dir_entries_per_block = ctx.geometry.dir_entries_per_block as usize;
    let mut count = inode.size as usize / ENTRY_SIZE;

    while count > 1 {
        let idx = count - 1;
        let outer = idx / dir_entries_per_block;
        let inner = idx % dir_entries_per_block;
        let block_no = resolve_block_read(ctx, &inode, outer)?;

        let is_vacant = if block_no == 0 {
            true
        } else {
            let block = ctx.block(u64::from(block_no))?;
            block[inner * ENTRY_SIZE..(inner + 1) * ENTRY_SIZE].as_data_view().get::<RawDirEntry>(0).is_vacant()
        };
        if !is_vacant {
            break;
        }
        count -= 1;

        if inner == 0 && block_no != 0 {
            ctx.free_block(block_no);
            if outer == NUM_DIRECT {
                if inode.indirect != 0 {
                    ctx.free_block(inode.indirect);
                    inode.indirect = 0;
                }
            } else if outer < NUM_DIRECT {
                inode.direct[outer] = 0;
            }
        }
    }

    inode.size = (count * ENTRY_SIZE) as u32;
    *ctx.inode_mut(dir_inum)? = inode;
    ctx.mark_inode_dirty(dir_inum);
    Ok(())
}
