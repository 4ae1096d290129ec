//! End-to-end scenarios driven straight through the dispatcher, playing
//! the role of a client since client-side code is out of scope here.

use arrayvec::ArrayVec;
use block_io::{MemDisk, SectorDevice};
use dataview::PodMethods as _;
use fs_types::{InodeType, RawFsHeader, DIRNAMELEN, ROOT_INUM};
use fsd::context::ServerContext;
use fsd::dispatch::{dispatch, DispatchOutcome};
use fsd::fs::inode_ops::create_file_inode;
use fs_types::InodeNo;
use wire::{Reply, Request};

fn name(bytes: &[u8]) -> wire::Name {
    let mut n: ArrayVec<u8, DIRNAMELEN> = ArrayVec::new();
    n.try_extend_from_slice(bytes).unwrap();
    n
}

fn fresh_fs(num_inodes: u32, num_blocks: u32, sector_size: u32) -> ServerContext<MemDisk> {
    let header = RawFsHeader { magic: RawFsHeader::MAGIC, num_inodes, num_blocks, sector_size };
    let disk = MemDisk::new(u64::from(num_blocks) + 16, sector_size as usize);
    let mut header_sector = vec![0u8; sector_size as usize];
    header_sector[..std::mem::size_of::<RawFsHeader>()].copy_from_slice(header.as_bytes());
    disk.write_sector(fs_types::HEADER_SECTOR, &header_sector).unwrap();
    let mut ctx = ServerContext::new(disk, 32, 32).unwrap();
    // A real mkfs'd image never has the root inode on the free list;
    // reserve it here the same way before materializing it, otherwise the
    // first CreateFile/CreateDir in a test would recycle inode 1 itself.
    assert_eq!(ctx.alloc_inode(), ROOT_INUM);
    create_file_inode(&mut ctx, InodeNo::ROOT, InodeNo::ROOT, InodeType::Directory).unwrap();
    ctx
}

fn create_file(ctx: &mut ServerContext<MemDisk>, parent: u32, n: &[u8]) -> wire::FileRecord {
    let outcome = dispatch(ctx, Request::CreateFile { parent_inum: parent, name: name(n) }, &[]).unwrap();
    match outcome.reply {
        Reply::File(record) => record,
        other => panic!("expected a file reply, got {other:?}"),
    }
}

fn write(ctx: &mut ServerContext<MemDisk>, inum: u32, pos: u32, reuse: u32, data: &[u8]) -> i32 {
    let outcome = dispatch(
        ctx,
        Request::WriteFile { inum, pos, size: data.len() as u32, reuse },
        data,
    )
    .unwrap();
    match outcome.reply {
        Reply::Arg1(n) => n,
        other => panic!("expected an arg1 reply, got {other:?}"),
    }
}

fn read(ctx: &mut ServerContext<MemDisk>, inum: u32, pos: u32, size: u32, reuse: u32) -> (i32, Vec<u8>) {
    let outcome = dispatch(ctx, Request::ReadFile { inum, pos, size, reuse }, &[]).unwrap();
    match outcome.reply {
        Reply::Arg1(n) => (n, outcome.payload),
        other => panic!("expected an arg1 reply, got {other:?}"),
    }
}

#[test]
fn a_freshly_created_file_system_has_an_empty_root_directory() {
    let mut ctx = fresh_fs(64, 128, 512);
    let outcome = dispatch(&mut ctx, Request::GetFile { inum: ROOT_INUM }, &[]).unwrap();
    let record = match outcome.reply {
        Reply::File(record) => record,
        other => panic!("unexpected reply: {other:?}"),
    };
    assert_eq!(record.ty, InodeType::Directory as i16);
    assert_eq!(record.size, 2 * std::mem::size_of::<fs_types::RawDirEntry>() as u32);
}

#[test]
fn write_then_read_round_trips_across_a_partial_block_boundary() {
    let mut ctx = fresh_fs(64, 128, 512);
    let file = create_file(&mut ctx, ROOT_INUM, b"greeting");

    let payload = b"hello, world".repeat(10);
    let n = write(&mut ctx, file.inum, 100, file.reuse, &payload);
    assert_eq!(n as usize, payload.len());

    let (n, bytes) = read(&mut ctx, file.inum, 100, payload.len() as u32, file.reuse);
    assert_eq!(n as usize, payload.len());
    assert_eq!(bytes, payload);
}

#[test]
fn a_write_crossing_the_direct_block_boundary_leaves_earlier_blocks_as_holes() {
    let mut ctx = fresh_fs(64, 512, 64);
    let file = create_file(&mut ctx, ROOT_INUM, b"sparse");
    let max_direct = ctx.geometry.max_direct_size as u32;

    let payload = vec![0x42u8; 32];
    let n = write(&mut ctx, file.inum, max_direct + 16, file.reuse, &payload);
    assert_eq!(n as usize, payload.len());

    let (n, bytes) = read(&mut ctx, file.inum, 0, max_direct, file.reuse);
    assert_eq!(n as u32, max_direct);
    assert!(bytes.iter().all(|&b| b == 0));

    let (n, bytes) = read(&mut ctx, file.inum, max_direct + 16, 32, file.reuse);
    assert_eq!(n as usize, 32);
    assert_eq!(bytes, payload);
}

#[test]
fn mkdir_create_unlink_rmdir_round_trips_free_resource_counts() {
    let mut ctx = fresh_fs(64, 128, 512);
    let free_inodes_before = ctx.free_inodes.len();
    let free_blocks_before = ctx.free_blocks.len();

    let dir = match dispatch(&mut ctx, Request::CreateDir { parent_inum: ROOT_INUM, name: name(b"sub") }, &[])
        .unwrap()
        .reply
    {
        Reply::File(record) => record,
        other => panic!("unexpected reply: {other:?}"),
    };

    let file = create_file(&mut ctx, dir.inum, b"leaf");
    write(&mut ctx, file.inum, 0, file.reuse, b"data");

    let outcome = dispatch(&mut ctx, Request::Unlink { target_inum: file.inum, parent_inum: dir.inum }, &[]).unwrap();
    assert!(matches!(outcome.reply, Reply::Arg1(0)));

    let outcome = dispatch(&mut ctx, Request::DeleteDir { target_inum: dir.inum, parent_inum: ROOT_INUM }, &[]).unwrap();
    assert!(matches!(outcome.reply, Reply::Arg1(0)));

    assert_eq!(ctx.free_inodes.len(), free_inodes_before);
    assert_eq!(ctx.free_blocks.len(), free_blocks_before);
}

#[test]
fn a_stale_handle_is_rejected_after_the_inode_is_recycled() {
    let mut ctx = fresh_fs(64, 128, 512);
    let first = create_file(&mut ctx, ROOT_INUM, b"once");
    dispatch(&mut ctx, Request::Unlink { target_inum: first.inum, parent_inum: ROOT_INUM }, &[]).unwrap();
    let second = create_file(&mut ctx, ROOT_INUM, b"once");
    assert_eq!(first.inum, second.inum);
    assert_ne!(first.reuse, second.reuse);

    let (n, _) = read(&mut ctx, second.inum, 0, 1, first.reuse);
    assert_eq!(n, -1);
    let n = write(&mut ctx, second.inum, 0, first.reuse, b"x");
    assert_eq!(n, -3);
}

#[test]
fn search_file_reports_inum_zero_for_a_missing_name() {
    let mut ctx = fresh_fs(64, 128, 512);
    let outcome = dispatch(&mut ctx, Request::SearchFile { parent_inum: ROOT_INUM, name: name(b"nope") }, &[]).unwrap();
    match outcome.reply {
        Reply::File(record) => assert_eq!(record.inum, 0),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn link_adds_a_second_name_and_bumps_nlink() {
    let mut ctx = fresh_fs(64, 128, 512);
    let file = create_file(&mut ctx, ROOT_INUM, b"first");
    let outcome = dispatch(
        &mut ctx,
        Request::Link { target_inum: file.inum, parent_inum: ROOT_INUM, name: name(b"second") },
        &[],
    )
    .unwrap();
    assert!(matches!(outcome.reply, Reply::Arg1(0)));

    let record = match dispatch(&mut ctx, Request::GetFile { inum: file.inum }, &[]).unwrap().reply {
        Reply::File(record) => record,
        other => panic!("unexpected reply: {other:?}"),
    };
    assert_eq!(record.nlink, 2);
}

#[test]
fn sync_with_shutdown_flushes_dirty_state_and_reports_shutdown() {
    let mut ctx = fresh_fs(64, 128, 512);
    let file = create_file(&mut ctx, ROOT_INUM, b"dirty");
    write(&mut ctx, file.inum, 0, file.reuse, b"payload");

    let DispatchOutcome { reply, shutdown, .. } =
        dispatch(&mut ctx, Request::Sync { shutdown: true }, &[]).unwrap();
    assert!(matches!(reply, Reply::Ack));
    assert!(shutdown);
}

#[test]
fn create_reports_minus_three_once_every_inode_is_allocated() {
    let mut ctx = fresh_fs(8, 128, 512);
    // Drain the free-inode buffer directly so block exhaustion can't
    // interfere with the condition this test is about.
    while !ctx.free_inodes.is_empty() {
        ctx.alloc_inode();
    }

    let outcome = dispatch(&mut ctx, Request::CreateFile { parent_inum: ROOT_INUM, name: name(b"overflow") }, &[]).unwrap();
    match outcome.reply {
        Reply::Arg1(code) => assert_eq!(code, -3),
        Reply::File(_) => panic!("expected inode exhaustion to be reported"),
        Reply::Ack => panic!("expected inode exhaustion to be reported"),
    }
}
