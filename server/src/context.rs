//! The one server context value threaded through every handler
//! (`spec.md` §9): no ambient globals, just an owned struct passed by
//! `&mut` reference.

use std::mem::size_of;

use block_io::{BlockCache, SectorDevice};
use dataview::PodMethods as _;
use fs_types::{Geometry, InodeNo, RawFsHeader, RawInode, HEADER_SECTOR};

use crate::cache::InodeCache;
use crate::error::FsError;
use crate::freelist::{self, FreeList};

pub struct ServerContext<D> {
    pub geometry: Geometry,
    blocks: BlockCache<D>,
    inodes: InodeCache,
    pub free_inodes: FreeList,
    pub free_blocks: FreeList,
}

impl<D: SectorDevice> ServerContext<D> {
    pub fn new(device: D, block_cache_capacity: usize, inode_cache_capacity: usize) -> Result<Self, FsError> {
        let mut blocks = BlockCache::new(device, block_cache_capacity);
        let geometry = read_geometry(&mut blocks)?;
        let (free_inodes, free_blocks) = freelist::build_free_lists(&geometry, &mut blocks)?;
        Ok(Self {
            geometry,
            blocks,
            inodes: InodeCache::new(inode_cache_capacity),
            free_inodes,
            free_blocks,
        })
    }

    pub fn inode(&mut self, inum: InodeNo) -> Result<RawInode, FsError> {
        Ok(*self.inodes.get_mut(inum, &mut self.blocks, &self.geometry)?)
    }

    pub fn inode_mut(&mut self, inum: InodeNo) -> Result<&mut RawInode, FsError> {
        self.inodes.get_mut(inum, &mut self.blocks, &self.geometry)
    }

    pub fn mark_inode_dirty(&mut self, inum: InodeNo) {
        self.inodes.mark_dirty(inum);
    }

    pub fn block(&mut self, sector: u64) -> Result<&[u8], FsError> {
        Ok(self.blocks.get_block(sector)?)
    }

    pub fn block_mut(&mut self, sector: u64) -> Result<&mut [u8], FsError> {
        Ok(self.blocks.get_block_mut(sector)?)
    }

    pub fn mark_block_dirty(&mut self, sector: u64) {
        self.blocks.mark_dirty(sector);
    }

    /// Pops a block number from the free-block buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty. Every caller must have already
    /// admission-checked the number of blocks it needs (`spec.md` §9).
    pub fn alloc_block(&mut self) -> u32 {
        self.free_blocks.pop().expect("caller must admission-check free blocks before allocating")
    }

    pub fn free_block(&mut self, block_no: u32) {
        self.free_blocks.push(block_no);
    }

    /// Pops an inode number from the free-inode buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty; callers must check
    /// `free_inodes.is_empty()` first.
    pub fn alloc_inode(&mut self) -> u32 {
        self.free_inodes.pop().expect("caller must check free_inodes before allocating")
    }

    pub fn free_inode(&mut self, inum: u32) {
        self.free_inodes.push(inum);
    }

    /// Flushes the inode cache into the block cache, then the block cache
    /// to disk (`spec.md` §4.10).
    pub fn sync(&mut self) -> Result<(), FsError> {
        self.inodes.flush_all(&mut self.blocks, &self.geometry)
    }
}

fn read_geometry<D: SectorDevice>(blocks: &mut BlockCache<D>) -> Result<Geometry, FsError> {
    let sector = blocks.get_block(HEADER_SECTOR)?;
    if sector.len() < size_of::<RawFsHeader>() {
        return Err(FsError::CorruptHeader("header sector smaller than fs_header".into()));
    }
    let header = *sector[..size_of::<RawFsHeader>()].as_data_view().get::<RawFsHeader>(0);
    if header.magic != RawFsHeader::MAGIC {
        return Err(FsError::CorruptHeader(format!("bad magic {:#x}", header.magic)));
    }
    Ok(Geometry::from_header(&header))
}
