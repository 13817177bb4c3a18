use std::error::Error;
use std::time::Duration;

use clap::Parser;
use log::{info, LevelFilter};

use client::session::{resolve_address, Session};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reference client for the tick-loop game server", long_about = None)]
struct Args {
    /// Server address as host:port
    #[arg(short, long, default_value = "127.0.0.1:7777")]
    server: String,

    /// Input send period in milliseconds
    #[arg(long, default_value_t = 16)]
    send_period_ms: u64,

    /// Stop after this many seconds; runs until disconnected when unset
    #[arg(long)]
    run_secs: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    shared::logging::init(LevelFilter::Info);

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=debug for detailed logging");
    }

    let args = Args::parse();
    let server = resolve_address(&args.server)?;

    info!("connecting to {server}");
    let mut session = Session::connect(server, Duration::from_millis(args.send_period_ms))?;
    if let Some(peer) = session.peer_id() {
        info!("connected, peer={peer}");
    }

    session.run(args.run_secs.map(Duration::from_secs))?;

    if let Some(snapshot) = session.last_snapshot() {
        info!(
            "last snapshot: serverTick={} ackApplied={} ackRecv={}",
            snapshot.server_tick, snapshot.ack_applied, snapshot.ack_recv
        );
    }

    session.shutdown()?;
    Ok(())
}
