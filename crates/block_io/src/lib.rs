//! Sector I/O and the write-back block cache layered on top of it.
//!
//! [`SectorDevice`] is the "external collaborator" from `spec.md` §1: raw
//! disk sector I/O. [`BlockCache`] implements `spec.md` §4.1: a
//! fixed-capacity LRU of sector-sized buffers, keyed by sector number, that
//! writes a dirty buffer back before it is reused or on an explicit flush.

mod device;

use std::io;

use arena_lru::Lru;

pub use device::{FileDisk, MemDisk, SectorDevice};

#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("I/O error on sector {sector}: {source}")]
    Io { sector: u64, source: io::Error },
    #[error("sector {sector} out of range (0..{num_sectors})")]
    OutOfRange { sector: u64, num_sectors: u64 },
}

struct BlockEntry {
    data: Vec<u8>,
    dirty: bool,
}

/// A fixed-capacity, write-back LRU cache of disk sectors.
pub struct BlockCache<D> {
    device: D,
    sector_size: usize,
    lru: Lru<u64, BlockEntry>,
}

impl<D: SectorDevice> BlockCache<D> {
    #[must_use]
    pub fn new(device: D, capacity: usize) -> Self {
        let sector_size = device.sector_size();
        Self {
            device,
            sector_size,
            lru: Lru::new(capacity),
        }
    }

    #[must_use]
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Returns the buffer for `sector`, reading it from disk on a cache
    /// miss and writing back the evicted least-recently-used buffer first
    /// if the cache is full and that buffer is dirty.
    pub fn get_block(&mut self, sector: u64) -> Result<&[u8], DiskError> {
        Ok(&*self.get_block_mut(sector)?)
    }

    /// Mutable variant of [`Self::get_block`]; does not itself mark the
    /// block dirty — call [`Self::mark_dirty`] after writing through the
    /// returned slice.
    pub fn get_block_mut(&mut self, sector: u64) -> Result<&mut [u8], DiskError> {
        let num_sectors = self.device.num_sectors();
        if sector >= num_sectors {
            return Err(DiskError::OutOfRange { sector, num_sectors });
        }

        let sector_size = self.sector_size;
        let device = &self.device;
        let entry = self.lru.get_or_insert_with(
            sector,
            || {
                let mut data = vec![0u8; sector_size];
                device.read_sector(sector, &mut data).map_err(|source| DiskError::Io { sector, source })?;
                Ok(BlockEntry { data, dirty: false })
            },
            |evicted_sector, entry| {
                if entry.dirty {
                    device
                        .write_sector(*evicted_sector, &entry.data)
                        .map_err(|source| DiskError::Io {
                            sector: *evicted_sector,
                            source,
                        })?;
                    entry.dirty = false;
                }
                Ok(())
            },
        )?;
        Ok(&mut entry.data[..])
    }

    /// Marks the most-recently-accessed copy of `sector` dirty.
    ///
    /// # Panics
    ///
    /// Panics if `sector` is not currently cached; callers must call this
    /// only right after a `get_block`/`get_block_mut` on the same sector.
    pub fn mark_dirty(&mut self, sector: u64) {
        let entry = self
            .lru
            .get_mut(&sector)
            .expect("mark_dirty called on a sector not in the cache");
        entry.dirty = true;
    }

    /// Writes back every dirty buffer, most-recently-used first, clearing
    /// dirty bits as it goes.
    pub fn flush_all(&mut self) -> Result<(), DiskError> {
        let device = &self.device;
        let mut first_err = None;
        self.lru.for_each_mru_to_lru(|sector, entry| {
            if entry.dirty && first_err.is_none() {
                match device.write_sector(*sector, &entry.data) {
                    Ok(()) => entry.dirty = false,
                    Err(source) => first_err = Some(DiskError::Io { sector: *sector, source }),
                }
            }
        });
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
