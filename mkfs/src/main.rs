//! Builds a fresh, empty disk image: boot sector, header, a zeroed inode
//! table, and a root directory inode with "." and ".." entries.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use block_io::{FileDisk, SectorDevice};
use clap::Parser;
use dataview::PodMethods as _;
use fs_types::{Geometry, InodeType, RawDirEntry, RawFsHeader, RawInode, HEADER_SECTOR, ROOT_INUM};

/// Creates an empty file-system image.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path of the image file to create (overwritten if it exists).
    image: PathBuf,

    /// Number of inodes the image can hold.
    #[arg(long, default_value_t = 256)]
    inodes: u32,

    /// Number of data blocks the image can hold.
    #[arg(long, default_value_t = 2048)]
    blocks: u32,

    /// Sector size in bytes.
    #[arg(long, default_value_t = 512)]
    sector_size: u32,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match build(&args) {
        Ok(()) => {
            println!(
                "wrote {} ({} inodes, {} blocks, {} bytes/sector)",
                args.image.display(),
                args.inodes,
                args.blocks,
                args.sector_size
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("mkfs: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build(args: &Args) -> std::io::Result<()> {
    let header = RawFsHeader {
        magic: RawFsHeader::MAGIC,
        num_inodes: args.inodes,
        num_blocks: args.blocks,
        sector_size: args.sector_size,
    };
    let geometry = Geometry::from_header(&header);
    let total_sectors = geometry.first_data_sector + u64::from(args.blocks);

    let file = File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.image)?;
    file.set_len(total_sectors * u64::from(args.sector_size))?;
    drop(file);

    let disk = FileDisk::open(&args.image, args.sector_size as usize)?;

    let zero = vec![0u8; args.sector_size as usize];
    for sector in 0..total_sectors {
        disk.write_sector(sector, &zero)?;
    }

    write_header(&disk, &header)?;
    create_root_directory(&disk, &geometry)?;

    Ok(())
}

fn write_header(disk: &FileDisk, header: &RawFsHeader) -> std::io::Result<()> {
    let mut sector = vec![0u8; disk.sector_size()];
    sector[..std::mem::size_of::<RawFsHeader>()].copy_from_slice(header.as_bytes());
    disk.write_sector(HEADER_SECTOR, &sector)
}

fn create_root_directory(disk: &FileDisk, geometry: &Geometry) -> std::io::Result<()> {
    let root_block = geometry.first_data_sector;
    debug_assert!(root_block < geometry.first_data_sector + u64::from(geometry.num_blocks));

    let mut dir_sector = vec![0u8; disk.sector_size()];
    let entry_size = std::mem::size_of::<RawDirEntry>();

    let mut dot = RawDirEntry::vacant();
    dot.inum = ROOT_INUM;
    dot.set_name(b".");
    dir_sector[..entry_size].copy_from_slice(dot.as_bytes());

    let mut dotdot = RawDirEntry::vacant();
    dotdot.inum = ROOT_INUM;
    dotdot.set_name(b"..");
    dir_sector[entry_size..2 * entry_size].copy_from_slice(dotdot.as_bytes());

    disk.write_sector(root_block, &dir_sector)?;

    let mut root_inode = RawInode::free();
    root_inode.ty = InodeType::Directory as i16;
    root_inode.nlink = 1;
    root_inode.size = 2 * u32::try_from(entry_size).unwrap();
    root_inode.direct[0] = u32::try_from(root_block).unwrap();

    let inode_sector_no = geometry.inode_sector(ROOT_INUM);
    let offset = geometry.inode_offset_in_sector(ROOT_INUM);
    let mut inode_sector = vec![0u8; disk.sector_size()];
    disk.read_sector(inode_sector_no, &mut inode_sector)?;
    inode_sector[offset..offset + std::mem::size_of::<RawInode>()].copy_from_slice(root_inode.as_bytes());
    disk.write_sector(inode_sector_no, &inode_sector)?;

    Ok(())
}
