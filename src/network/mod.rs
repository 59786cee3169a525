//! Network Module
//!
//! TCP front end for a single replicated state instance.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls the shutdown flag)
//! - One thread per connection, bounded by `max_connections`
//! - Commands routed through `ReplicatedState`

mod client;
mod connection;
mod server;

pub use client::{Client, RemoteSnapshotSource};
pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
