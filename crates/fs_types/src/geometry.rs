use std::mem::size_of;

use crate::repr::{RawDirEntry, RawInode, NUM_DIRECT};
use crate::RawFsHeader;

/// Quantities derived once from [`RawFsHeader`] at boot and held immutable
/// for the lifetime of the server process.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub num_inodes: u32,
    pub num_blocks: u32,
    pub sector_size: u32,
    pub inodes_per_block: u32,
    pub dir_entries_per_block: u32,
    pub inode_table_blocks: u32,
    /// First sector available for directory/file data.
    pub first_data_sector: u64,
    pub max_direct_size: u64,
    pub max_indirect_size: u64,
    pub max_file_size: u64,
}

impl Geometry {
    #[must_use]
    pub fn from_header(header: &RawFsHeader) -> Self {
        let sector_size = header.sector_size;
        let inodes_per_block = sector_size / u32::try_from(size_of::<RawInode>()).unwrap();
        let dir_entries_per_block = sector_size / u32::try_from(size_of::<RawDirEntry>()).unwrap();
        assert!(inodes_per_block > 0, "sector too small to hold one inode");

        let inode_table_blocks = header.num_inodes.div_ceil(inodes_per_block);
        // sector 0 = boot, sector 1 = header, then the inode table.
        let first_data_sector = u64::from(crate::HEADER_SECTOR) + 1 + u64::from(inode_table_blocks);

        let max_direct_size = u64::from(sector_size) * u64::try_from(NUM_DIRECT).unwrap();
        let ptrs_per_block = u64::from(sector_size) / 4;
        let max_indirect_size = u64::from(sector_size) * ptrs_per_block;

        Self {
            num_inodes: header.num_inodes,
            num_blocks: header.num_blocks,
            sector_size,
            inodes_per_block,
            dir_entries_per_block,
            inode_table_blocks,
            first_data_sector,
            max_direct_size,
            max_indirect_size,
            max_file_size: max_direct_size + max_indirect_size,
        }
    }

    /// Sector holding the inode table block for `inum`.
    #[must_use]
    pub fn inode_sector(&self, inum: u32) -> u64 {
        let block_index = u64::from((inum - 1) / self.inodes_per_block);
        self.header_sectors() + block_index
    }

    /// Offset of `inum`'s inode within its sector.
    #[must_use]
    pub fn inode_offset_in_sector(&self, inum: u32) -> usize {
        ((inum - 1) % self.inodes_per_block) as usize * size_of::<RawInode>()
    }

    fn header_sectors(&self) -> u64 {
        u64::from(crate::HEADER_SECTOR) + 1
    }

    /// Number of pointers an indirect block holds.
    #[must_use]
    pub fn indirect_ptrs_per_block(&self) -> u32 {
        self.sector_size / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> RawFsHeader {
        RawFsHeader {
            magic: RawFsHeader::MAGIC,
            num_inodes: 64,
            num_blocks: 128,
            sector_size: 512,
        }
    }

    #[test]
    fn derives_classic_512_byte_geometry() {
        let g = Geometry::from_header(&header());
        assert_eq!(g.inodes_per_block, 8);
        assert_eq!(g.dir_entries_per_block, 16);
        assert_eq!(g.max_direct_size, 512 * 12);
        assert_eq!(g.max_indirect_size, 512 * 128);
        assert_eq!(g.max_file_size, 512 * 12 + 512 * 128);
    }

    #[test]
    fn inode_sector_walks_the_table_in_order() {
        let g = Geometry::from_header(&header());
        assert_eq!(g.inode_sector(1), g.header_sectors());
        assert_eq!(g.inode_sector(8), g.header_sectors());
        assert_eq!(g.inode_sector(9), g.header_sectors() + 1);
    }
}
