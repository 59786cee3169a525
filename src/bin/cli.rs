//! replikv CLI Client
//!
//! Command-line interface for interacting with a replikv server.

use clap::{Parser, Subcommand};
use replikv::network::Client;
use replikv::{Mutation, ReadOptions, WriteOptions};

/// replikv CLI
#[derive(Parser, Debug)]
#[command(name = "replikv-cli")]
#[command(about = "CLI for the replikv replicated key-value state")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7420")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set one or more key=value pairs in a single batch
    Set {
        /// Pairs in key=value form
        #[arg(required = true)]
        pairs: Vec<String>,

        /// Wait until the write is durable on stable storage
        #[arg(long)]
        wait_for_sync: bool,

        /// Wait until the write is applied locally
        #[arg(long)]
        wait_for_applied: bool,

        /// Return once the leader accepted the write
        #[arg(long)]
        no_commit: bool,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Get one or more keys
    Get {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Only serve once this index is applied
        #[arg(long)]
        read_from: Option<u64>,

        /// Confirm leadership before serving
        #[arg(long)]
        linearizable: bool,
    },

    /// Dump a snapshot
    Snapshot {
        /// Wait until this index is applied
        #[arg(long)]
        wait_for_index: Option<u64>,

        /// Transfer in chunks
        #[arg(long)]
        chunked: bool,
    },

    /// Show instance status
    Status,

    /// Discard all state of the instance
    Drop,

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> replikv::Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Set {
            pairs,
            wait_for_sync,
            wait_for_applied,
            no_commit,
        } => {
            let batch = pairs
                .iter()
                .map(|pair| parse_pair(pair))
                .collect::<replikv::Result<Vec<_>>>()?;
            let options = WriteOptions {
                wait_for_sync,
                wait_for_commit: !no_commit,
                wait_for_applied,
                timeout: None,
            };
            let index = client.write(batch, options)?;
            println!("OK index={}", index);
        }
        Commands::Del { key } => {
            let index = client.write(vec![Mutation::delete(key)], WriteOptions::default())?;
            println!("OK index={}", index);
        }
        Commands::Get {
            keys,
            read_from,
            linearizable,
        } => {
            let options = ReadOptions {
                read_from,
                linearizable,
                ..ReadOptions::default()
            };
            let result = client.multi_get(keys, options)?;
            println!("index={}", result.index);
            for (key, value) in result.values {
                match value {
                    Some(v) => println!("{} = {}", key, String::from_utf8_lossy(&v)),
                    None => println!("{} (not present)", key),
                }
            }
        }
        Commands::Snapshot {
            wait_for_index,
            chunked,
        } => {
            let snapshot = if chunked {
                client.snapshot_chunked(wait_for_index)?
            } else {
                client.snapshot(wait_for_index)?
            };
            println!(
                "index={} generation={} keys={}",
                snapshot.index,
                snapshot.generation,
                snapshot.entries.len()
            );
            for (key, value) in snapshot.entries {
                println!("{} = {}", key, String::from_utf8_lossy(&value));
            }
        }
        Commands::Status => {
            let status = client.status()?;
            println!("instance:   {}/{}", status.database, status.instance_id);
            println!("role:       {:?}", status.role);
            println!("generation: {}", status.generation);
            println!("state:      {:?}", status.manager_state);
            println!("applied:    {}", status.applied_index);
            println!("committed:  {}", status.committed_index);
            println!(
                "snapshot:   {:?} at {} (index {})",
                status.snapshot.status, status.snapshot.timestamp_ms, status.snapshot.index
            );
        }
        Commands::Drop => {
            client.drop_instance()?;
            println!("OK");
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}

fn parse_pair(pair: &str) -> replikv::Result<Mutation> {
    let (key, value) = pair.split_once('=').ok_or_else(|| {
        replikv::ReplError::InvalidRequest(format!("Expected key=value, got '{}'", pair))
    })?;
    Ok(Mutation::put(key, value.as_bytes().to_vec()))
}
