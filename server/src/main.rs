use std::process::ExitCode;

use clap::Parser;
use log::{info, LevelFilter};

use server::engine::{Engine, EngineConfig};
use server::game::ServerGame;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative tick-loop game server", long_about = None)]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Simulation tick rate in Hz
    #[arg(long, default_value_t = 60)]
    sim_hz: u32,

    /// Network tick rate in Hz
    #[arg(long, default_value_t = 20)]
    net_hz: u32,

    /// Ticks between receiving an input and applying it
    #[arg(long, default_value_t = 1)]
    input_delay: u32,

    /// Capacity of the scheduled-input ring, in ticks
    #[arg(long, default_value_t = 256)]
    ring_capacity: usize,

    /// Maximum number of concurrent peers
    #[arg(long, default_value_t = shared::MAX_PEERS)]
    max_peers: usize,
}

fn main() -> ExitCode {
    shared::logging::init(LevelFilter::Info);

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=debug for detailed logging");
    }

    let args = Args::parse();

    let mut engine = Engine::new(EngineConfig {
        sim_hz: args.sim_hz,
        net_hz: args.net_hz,
        input_delay_ticks: args.input_delay,
        ring_capacity: args.ring_capacity,
        max_peers: args.max_peers,
    });
    let mut game = ServerGame::new(args.port, engine.shared());

    info!("starting server on port {}", args.port);
    engine.run(&mut game);

    if game.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
