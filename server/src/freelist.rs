//! Boot-time free-list construction (`spec.md` §4.3): one scan builds the
//! free-inode ring buffer, a second builds the free-block ring buffer by
//! marking every block reachable from a live inode "busy" and collecting
//! what's left.

use std::collections::{HashMap, VecDeque};

use block_io::{BlockCache, SectorDevice};
use fs_types::{Geometry, InodeNo, InodeType, NUM_DIRECT};

use crate::error::FsError;
use crate::raw_inode;

/// A fixed-capacity ring buffer of available inode or block numbers.
#[derive(Debug, Default)]
pub struct FreeList {
    items: VecDeque<u32>,
}

impl FreeList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pop(&mut self) -> Option<u32> {
        self.items.pop_front()
    }

    pub fn push(&mut self, value: u32) {
        self.items.push_back(value);
    }
}

pub(crate) fn build_free_lists<D: SectorDevice>(
    geometry: &Geometry,
    blocks: &mut BlockCache<D>,
) -> Result<(FreeList, FreeList), FsError> {
    Ok((scan_free_inodes(geometry, blocks)?, scan_free_blocks(geometry, blocks)?))
}

fn scan_free_inodes<D: SectorDevice>(
    geometry: &Geometry,
    blocks: &mut BlockCache<D>,
) -> Result<FreeList, FsError> {
    let mut items = VecDeque::new();
    for inum in 1..=geometry.num_inodes {
        let inode = raw_inode::read(geometry, blocks, InodeNo::new(inum))?;
        if inode.inode_type() == InodeType::Free {
            items.push_back(inum);
        }
    }
    Ok(FreeList { items })
}

/// Marks block `b` busy: swaps it into the `candidates` prefix `[0,
/// *busy_len)` if it isn't already there, growing that prefix by one.
fn mark_busy(b: u32, candidates: &mut [u32], position: &mut HashMap<u32, usize>, busy_len: &mut usize) {
    if b == 0 {
        return;
    }
    if let Some(&idx) = position.get(&b) {
        if idx >= *busy_len {
            candidates.swap(idx, *busy_len);
            position.insert(candidates[idx], idx);
            position.insert(candidates[*busy_len], *busy_len);
            *busy_len += 1;
        }
    }
}

fn scan_free_blocks<D: SectorDevice>(
    geometry: &Geometry,
    blocks: &mut BlockCache<D>,
) -> Result<FreeList, FsError> {
    let mut candidates: Vec<u32> =
        (u32::try_from(geometry.first_data_sector).unwrap()..geometry.num_blocks).collect();
    let mut position: HashMap<u32, usize> =
        candidates.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    let mut busy_len = 0usize;

    for inum in 1..=geometry.num_inodes {
        let inode = raw_inode::read(geometry, blocks, InodeNo::new(inum))?;
        if inode.inode_type() == InodeType::Free {
            continue;
        }

        let used_blocks = inode.size.div_ceil(geometry.sector_size) as usize;
        let direct_count = used_blocks.min(NUM_DIRECT);
        for entry in inode.direct.iter().take(direct_count) {
            mark_busy(*entry, &mut candidates, &mut position, &mut busy_len);
        }

        if u64::from(inode.size) > geometry.max_direct_size && inode.indirect != 0 {
            mark_busy(inode.indirect, &mut candidates, &mut position, &mut busy_len);
            let indirect_count = used_blocks.saturating_sub(NUM_DIRECT);
            let block = blocks.get_block(u64::from(inode.indirect))?;
            let mut pointed = Vec::with_capacity(indirect_count);
            for i in 0..indirect_count {
                let off = i * 4;
                pointed.push(u32::from_ne_bytes(block[off..off + 4].try_into().unwrap()));
            }
            for b in pointed {
                mark_busy(b, &mut candidates, &mut position, &mut busy_len);
            }
        }
    }

    Ok(FreeList { items: candidates[busy_len..].iter().copied().collect() })
}

#[cfg(test)]
mod tests {
    use block_io::MemDisk;
    use fs_types::{RawFsHeader, HEADER_SECTOR};

    use super::*;

    fn fresh_disk() -> (Geometry, BlockCache<MemDisk>) {
        let header = RawFsHeader { magic: RawFsHeader::MAGIC, num_inodes: 16, num_blocks: 32, sector_size: 64 };
        let geometry = Geometry::from_header(&header);
        let disk = MemDisk::new(32, 64);
        let mut blocks = BlockCache::new(disk, 8);

        // All inodes start FREE (zeroed sectors already decode as ty=0).
        let _ = blocks.get_block(HEADER_SECTOR).unwrap();
        (geometry, blocks)
    }

    #[test]
    fn every_inode_is_free_on_a_blank_disk() {
        let (geometry, mut blocks) = fresh_disk();
        let free_inodes = scan_free_inodes(&geometry, &mut blocks).unwrap();
        assert_eq!(free_inodes.len(), geometry.num_inodes as usize);
    }

    #[test]
    fn every_data_block_is_free_on_a_blank_disk() {
        let (geometry, mut blocks) = fresh_disk();
        let free_blocks = scan_free_blocks(&geometry, &mut blocks).unwrap();
        assert_eq!(
            free_blocks.len(),
            (geometry.num_blocks - u32::try_from(geometry.first_data_sector).unwrap()) as usize
        );
    }

    #[test]
    fn a_direct_block_referenced_by_a_live_inode_is_not_free() {
        let (geometry, mut blocks) = fresh_disk();
        let mut inode = raw_inode::read(&geometry, &mut blocks, InodeNo::new(1)).unwrap();
        inode.ty = InodeType::Regular as i16;
        inode.size = geometry.sector_size;
        inode.direct[0] = u32::try_from(geometry.first_data_sector).unwrap();
        raw_inode::write(&geometry, &mut blocks, InodeNo::new(1), &inode).unwrap();

        let free_blocks = scan_free_blocks(&geometry, &mut blocks).unwrap();
        assert!(!free_blocks.items.contains(&inode.direct[0]));
    }
}
