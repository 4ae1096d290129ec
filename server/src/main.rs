use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::process::ExitCode;

use block_io::FileDisk;
use clap::Parser;
use fsd::context::ServerContext;
use fsd::dispatch::{self, DispatchOutcome};
use wire::{Channel, Request, UnixChannel};

/// A small UNIX-style file-system server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the disk image, previously created by `mkfs`.
    #[arg(long)]
    image: PathBuf,

    /// Unix domain socket path to listen on.
    #[arg(long)]
    socket: PathBuf,

    /// Capacity of the block cache, in sectors.
    #[arg(long, default_value_t = 64)]
    block_cache_size: usize,

    /// Capacity of the inode cache, in entries.
    #[arg(long, default_value_t = 64)]
    inode_cache_size: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let disk = match FileDisk::open(&args.image, 512) {
        Ok(disk) => disk,
        Err(e) => {
            log::error!("failed to open disk image {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    let mut ctx = match ServerContext::new(disk, args.block_cache_size, args.inode_cache_size) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("failed to initialize file system: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.socket.exists() {
        let _ = std::fs::remove_file(&args.socket);
    }
    let listener = match UnixListener::bind(&args.socket) {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("failed to bind {}: {e}", args.socket.display());
            return ExitCode::FAILURE;
        }
    };
    log::info!("listening on {}", args.socket.display());

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("failed to accept connection: {e}");
                continue;
            }
        };
        if serve_connection(&mut ctx, stream) {
            break;
        }
    }

    ExitCode::SUCCESS
}

/// Serves requests on one connection until it closes or the client asks
/// for shutdown. Returns `true` if the server should exit.
fn serve_connection<D: block_io::SectorDevice>(ctx: &mut ServerContext<D>, stream: UnixStream) -> bool {
    let mut channel = UnixChannel::new(stream);
    loop {
        let header = match channel.recv_header() {
            Ok(header) => header,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return false,
            Err(e) => {
                // Per spec.md §7, a receive failure is fatal to the dispatch
                // loop, not just this connection.
                log::error!("channel receive failed: {e}");
                return true;
            }
        };

        let request = match Request::decode(&header) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("malformed request: {e}");
                continue;
            }
        };

        let incoming_payload = match &request {
            Request::WriteFile { size, .. } => match channel.recv_payload(*size as usize) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("payload receive failed: {e}");
                    return true;
                }
            },
            _ => Vec::new(),
        };

        let opcode = request.opcode();
        let DispatchOutcome { reply, payload, shutdown } = match dispatch::dispatch(ctx, request, &incoming_payload) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("request handling failed: {e}");
                return true;
            }
        };

        if channel.send_header(&reply.encode(opcode)).is_err() {
            return false;
        }
        if !payload.is_empty() && channel.send_payload(&payload).is_err() {
            return false;
        }

        if shutdown {
            log::info!("shutdown requested, flushing and exiting");
            return true;
        }
    }
}
