use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Raw sector-addressable storage.
///
/// This is the "disk sector I/O" external collaborator from `spec.md` §1:
/// the file system core only ever reads or writes one fixed-size sector at
/// a time by number.
pub trait SectorDevice {
    fn sector_size(&self) -> usize;
    fn num_sectors(&self) -> u64;
    fn read_sector(&self, sector: u64, buf: &mut [u8]) -> io::Result<()>;
    fn write_sector(&self, sector: u64, buf: &[u8]) -> io::Result<()>;
}

/// An in-memory disk, used by tests and by the integration scenarios in
/// `server/tests`.
pub struct MemDisk {
    sector_size: usize,
    sectors: std::cell::RefCell<Vec<Vec<u8>>>,
}

impl MemDisk {
    #[must_use]
    pub fn new(num_sectors: u64, sector_size: usize) -> Self {
        Self {
            sector_size,
            sectors: std::cell::RefCell::new(vec![
                vec![0u8; sector_size];
                usize::try_from(num_sectors).unwrap()
            ]),
        }
    }

    /// Reads a sector directly, bypassing any cache, for test assertions.
    #[must_use]
    pub fn read_sector_for_test(&self, sector: u64) -> Vec<u8> {
        self.sectors.borrow()[usize::try_from(sector).unwrap()].clone()
    }
}

impl SectorDevice for MemDisk {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn num_sectors(&self) -> u64 {
        u64::try_from(self.sectors.borrow().len()).unwrap()
    }

    fn read_sector(&self, sector: u64, buf: &mut [u8]) -> io::Result<()> {
        let sectors = self.sectors.borrow();
        let src = sectors
            .get(usize::try_from(sector).unwrap())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sector out of range"))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_sector(&self, sector: u64, buf: &[u8]) -> io::Result<()> {
        let mut sectors = self.sectors.borrow_mut();
        let dst = sectors
            .get_mut(usize::try_from(sector).unwrap())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sector out of range"))?;
        dst.copy_from_slice(buf);
        Ok(())
    }
}

/// A disk image backed by a regular file.
pub struct FileDisk {
    file: std::sync::Mutex<File>,
    sector_size: usize,
    num_sectors: u64,
}

impl FileDisk {
    pub fn open(path: &Path, sector_size: usize) -> io::Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let num_sectors = len / u64::try_from(sector_size).unwrap();
        Ok(Self {
            file: std::sync::Mutex::new(file),
            sector_size,
            num_sectors,
        })
    }
}

impl SectorDevice for FileDisk {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn num_sectors(&self) -> u64 {
        self.num_sectors
    }

    fn read_sector(&self, sector: u64, buf: &mut [u8]) -> io::Result<()> {
        if sector >= self.num_sectors {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "sector out of range"));
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(sector * u64::try_from(self.sector_size).unwrap()))?;
        file.read_exact(buf)
    }

    fn write_sector(&self, sector: u64, buf: &[u8]) -> io::Result<()> {
        if sector >= self.num_sectors {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "sector out of range"));
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(sector * u64::try_from(self.sector_size).unwrap()))?;
        file.write_all(buf)
    }
}
