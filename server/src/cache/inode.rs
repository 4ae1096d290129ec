//! The inode cache layered on top of the block cache (`spec.md` §4.2): a
//! fixed-capacity LRU of working inode copies, keyed by inode number. A
//! dirty entry is merged back into its containing block — never the disk
//! directly — on eviction or flush, so the block cache remains the single
//! point of contact with storage.

use arena_lru::Lru;
use block_io::{BlockCache, SectorDevice};
use fs_types::{Geometry, InodeNo, RawInode};

use crate::error::FsError;
use crate::raw_inode;

struct CachedInode {
    inode: RawInode,
    dirty: bool,
}

pub(crate) struct InodeCache {
    lru: Lru<InodeNo, CachedInode>,
}

impl InodeCache {
    #[must_use]
    pub(crate) fn new(capacity: usize) -> Self {
        Self { lru: Lru::new(capacity) }
    }

    /// Returns the working copy of `inum`, loading it from the block cache
    /// on a miss, promoting it to most-recently-used either way.
    pub(crate) fn get_mut<D: SectorDevice>(
        &mut self,
        inum: InodeNo,
        blocks: &mut BlockCache<D>,
        geometry: &Geometry,
    ) -> Result<&mut RawInode, FsError> {
        if self.lru.contains(&inum) {
            return Ok(&mut self.lru.get_mut(&inum).expect("just checked contains").inode);
        }

        let loaded = raw_inode::read(geometry, blocks, inum)?;
        let entry = self.lru.get_or_insert_with(
            inum,
            || Ok::<CachedInode, FsError>(CachedInode { inode: loaded, dirty: false }),
            move |evicted_inum, cached| {
                if cached.dirty {
                    raw_inode::write(geometry, blocks, *evicted_inum, &cached.inode)?;
                    cached.dirty = false;
                }
                Ok(())
            },
        )?;
        Ok(&mut entry.inode)
    }

    pub(crate) fn mark_dirty(&mut self, inum: InodeNo) {
        self.lru
            .get_mut(&inum)
            .expect("mark_dirty called on an inode not in the cache")
            .dirty = true;
    }

    /// Merges every dirty working copy back into its block, most- to
    /// least-recently-used, then flushes the block cache to disk.
    pub(crate) fn flush_all<D: SectorDevice>(
        &mut self,
        blocks: &mut BlockCache<D>,
        geometry: &Geometry,
    ) -> Result<(), FsError> {
        let mut first_err = None;
        self.lru.for_each_mru_to_lru(|inum, cached| {
            if cached.dirty && first_err.is_none() {
                match raw_inode::write(geometry, blocks, *inum, &cached.inode) {
                    Ok(()) => cached.dirty = false,
                    Err(e) => first_err = Some(e),
                }
            }
        });
        if let Some(e) = first_err {
            return Err(e);
        }
        blocks.flush_all()?;
        Ok(())
    }
}
