//! replikv Server Binary
//!
//! Runs a single replicated state instance behind the TCP protocol. The
//! consensus layer is the in-process local log with this node as leader.

use std::sync::Arc;

use clap::Parser;
use replikv::network::Server;
use replikv::{pump, Config, ConsensusLog, LocalLog, ReplicatedState, Snapshot};
use tracing_subscriber::{fmt, EnvFilter};

/// Node name used on the local log
const NODE: &str = "local";

/// replikv Server
#[derive(Parser, Debug)]
#[command(name = "replikv-server")]
#[command(about = "Replicated key-value state machine server")]
#[command(version)]
struct Args {
    /// Database name
    #[arg(long, default_value = "_system")]
    database: String,

    /// Replicated state instance id
    #[arg(short, long, default_value = "s1")]
    instance: String,

    /// Directory for checkpoints (in-memory only when omitted)
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Checkpoint every N applied entries (0 disables)
    #[arg(long, default_value = "1000")]
    checkpoint_interval: u64,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7420")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,replikv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("replikv server v{}", replikv::VERSION);
    tracing::info!("Instance: {}/{}", args.database, args.instance);
    tracing::info!("Listen address: {}", args.listen);

    let mut builder = Config::builder()
        .database(&args.database)
        .instance_id(&args.instance)
        .checkpoint_interval(args.checkpoint_interval)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections);
    if let Some(dir) = &args.data_dir {
        tracing::info!("Data directory: {}", dir);
        builder = builder.data_dir(dir);
    }
    let config = builder.build();

    if let Err(e) = run(config) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

fn run(config: Config) -> replikv::Result<()> {
    // The checkpoint stands in for the log prefix it covers
    let (base_index, base_generation) = match config.snapshot_path() {
        Some(path) if path.exists() => {
            let snapshot = Snapshot::read_from(&path)?;
            (snapshot.index, snapshot.generation)
        }
        _ => (0, 0),
    };

    let log = Arc::new(LocalLog::with_base(base_index, true));
    let state = Arc::new(ReplicatedState::open(
        config.clone(),
        Arc::clone(&log) as Arc<dyn ConsensusLog>,
    )?);

    let events = log.subscribe(NODE, state.applied_index());
    let _applier = pump::spawn_applier(Arc::clone(&state), events, None)?;

    let generation = base_generation + 1;
    log.elect(NODE, generation)?;
    tracing::info!(generation, applied = state.applied_index(), "Instance leading");

    let server = Server::bind(config, state)?;
    server.run()
}
