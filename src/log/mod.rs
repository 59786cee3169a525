//! Consensus Log Boundary
//!
//! The consensus implementation is an external collaborator. This module
//! defines what the state machine needs from it and what it receives:
//!
//! ```text
//!   WriteCoordinator ── propose(generation, op) ──▶ ConsensusLog
//!                                                     │
//!   ReplicatedState ◀── LogEvent (crossbeam channel) ─┘
//!      Committed(entry) │ Synced(index) │ LeadershipChanged │ SnapshotRequired
//! ```
//!
//! `LocalLog` is an in-process stand-in that assigns indexes, tracks commit
//! and sync progress, and models leader changes and compaction.

mod entry;
mod local;

pub use entry::{Entry, Mutation, Operation};
pub(crate) use entry::unix_millis;
pub use local::LocalLog;

use crate::error::Result;
use crate::machine::Role;

/// What the state machine consumes from the consensus layer
pub trait ConsensusLog: Send + Sync {
    /// Submit an operation on the leader under `generation`.
    ///
    /// Returns the assigned index once the leader has accepted it. Commit is
    /// reported later through `LogEvent::Committed`.
    fn propose(&self, generation: u64, operation: Operation) -> Result<u64>;

    /// Highest index known committed by the consensus layer
    fn commit_index(&self) -> u64;
}

/// Inbound notifications from the consensus layer
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// An entry reached quorum; delivered in index order
    Committed(Entry),

    /// Entries up to this index are durable on local stable storage
    Synced(u64),

    /// Leadership moved to a new generation
    LeadershipChanged { generation: u64, role: Role },

    /// The log no longer holds entries at or below `index`; install a snapshot
    SnapshotRequired { index: u64 },
}
