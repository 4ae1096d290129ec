//! Shared byte-level accessors for reading/writing one inode's 64-byte
//! on-disk record through the block cache, used by both the inode cache
//! (`cache::inode`) and the boot-time free-list scan (`freelist`).

use std::mem::size_of;

use block_io::{BlockCache, SectorDevice};
use dataview::PodMethods as _;
use fs_types::{Geometry, InodeNo, RawInode};

use crate::error::FsError;

pub(crate) fn read<D: SectorDevice>(
    geometry: &Geometry,
    blocks: &mut BlockCache<D>,
    inum: InodeNo,
) -> Result<RawInode, FsError> {
    let sector = geometry.inode_sector(inum.value());
    let offset = geometry.inode_offset_in_sector(inum.value());
    let size = size_of::<RawInode>();
    let block = blocks.get_block(sector)?;
    Ok(*block[offset..offset + size].as_data_view().get::<RawInode>(0))
}

pub(crate) fn write<D: SectorDevice>(
    geometry: &Geometry,
    blocks: &mut BlockCache<D>,
    inum: InodeNo,
    inode: &RawInode,
) -> Result<(), FsError> {
    let sector = geometry.inode_sector(inum.value());
    let offset = geometry.inode_offset_in_sector(inum.value());
    let size = size_of::<RawInode>();
    let block = blocks.get_block_mut(sector)?;
    block[offset..offset + size].copy_from_slice(inode.as_bytes());
    blocks.mark_dirty(sector);
    Ok(())
}
