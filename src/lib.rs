//! # replikv
//!
//! A replicated key-value state machine that sits on top of a consensus log:
//! - Exactly-once, strictly ordered application of committed entries
//! - Tunable write durability (accepted / synced / committed / applied)
//! - Local, bounded-staleness and linearizable reads
//! - Generation fencing of writes from deposed leaders
//! - Snapshot produce / install, checkpoints and chunked transfer
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client (TCP or in-process)                   │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ write                        │ multi_get
//!                ▼                              ▼
//!      ┌──────────────────┐            ┌──────────────────┐
//!      │ WriteCoordinator │            │ ReadCoordinator  │
//!      └────────┬─────────┘            └────────┬─────────┘
//!               │ propose                       │ wait / serve
//!               ▼                               │
//!      ┌──────────────────┐                     │
//!      │  Consensus log   │ (external)          │
//!      └────────┬─────────┘                     │
//!               │ committed entries             │
//!               ▼                               ▼
//!      ┌──────────────────┐            ┌──────────────────┐
//!      │ LogEntryApplier  │───────────▶│  KeyValueStore   │
//!      └──────────────────┘            │    (RwLock)      │
//!      ┌──────────────────┐            └────────▲─────────┘
//!      │ SnapshotManager  │─────────────────────┘
//!      └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod coordinator;
pub mod log;
pub mod machine;
pub mod network;
pub mod protocol;
pub mod pump;
pub mod replica;
pub mod snapshot;
pub mod status;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use coordinator::{ReadOptions, ReadResult, WriteOptions};
pub use error::{ReplError, Result};
pub use log::{ConsensusLog, Entry, LocalLog, LogEvent, Mutation, Operation};
pub use machine::{ApplyOutcome, LeadershipState, Role};
pub use replica::ReplicatedState;
pub use snapshot::{Snapshot, SnapshotSource};
pub use status::{ManagerState, StatusReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of replikv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
