//! Tagged-opcode dispatch (`spec.md` §9): decode a request, run its
//! handler, hand back the reply plus any bulk payload bytes.

use block_io::SectorDevice;
use dataview::PodMethods as _;
use fs_types::InodeNo;
use wire::{Reply, Request};

use crate::context::ServerContext;
use crate::error::FsError;
use crate::fs::{ops, rw};

pub struct DispatchOutcome {
    pub reply: Reply,
    pub payload: Vec<u8>,
    pub shutdown: bool,
}

fn record_reply(outcome: ops::CreateReply) -> Reply {
    match outcome {
        ops::CreateReply::Record(record) => Reply::File(record),
        ops::CreateReply::Error(code) => Reply::Arg1(code),
    }
}

/// Runs `request` against `ctx`. `payload` carries the incoming
/// `WRITE_FILE` bytes already read off the channel; any outgoing bytes
/// (for `READ_FILE`) come back in [`DispatchOutcome::payload`].
pub fn dispatch<D: SectorDevice>(
    ctx: &mut ServerContext<D>,
    request: Request,
    payload: &[u8],
) -> Result<DispatchOutcome, FsError> {
    let mut out_payload = Vec::new();
    let mut shutdown = false;

    let reply = match request {
        Request::GetFile { inum } => Reply::File(ops::get_file(ctx, inum)?),
        Request::SearchFile { parent_inum, name } => Reply::File(ops::search_file(ctx, parent_inum, &name)?),
        Request::CreateFile { parent_inum, name } => record_reply(ops::create_file(ctx, parent_inum, &name)?),
        Request::CreateDir { parent_inum, name } => record_reply(ops::create_dir(ctx, parent_inum, &name)?),
        Request::ReadFile { inum, pos, size, reuse } => {
            let n = rw::read_file(ctx, InodeNo::new(inum), pos, size, reuse, &mut out_payload)?;
            Reply::Arg1(n)
        }
        Request::WriteFile { inum, pos, size, reuse } => {
            let n = rw::write_file(ctx, InodeNo::new(inum), pos, size, reuse, payload)?;
            Reply::Arg1(n)
        }
        Request::DeleteDir { target_inum, parent_inum } => Reply::Arg1(ops::rmdir(ctx, target_inum, parent_inum)?),
        Request::Link { target_inum, parent_inum, name } => Reply::Arg1(ops::link(ctx, target_inum, parent_inum, &name)?),
        Request::Unlink { target_inum, parent_inum } => Reply::Arg1(ops::unlink(ctx, target_inum, parent_inum)?),
        Request::Sync { shutdown: requested } => {
            ctx.sync()?;
            shutdown = requested;
            Reply::Ack
        }
    };

    Ok(DispatchOutcome { reply, payload: out_payload, shutdown })
}
