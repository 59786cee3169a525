//! Log entry definitions
//!
//! Defines the committed entries delivered by the consensus layer.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// A single committed slot of the replicated log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Log index - strictly increasing and gap-free
    pub index: u64,

    /// Generation of the leader that produced the entry
    pub generation: u64,

    /// The operation to apply
    pub operation: Operation,

    /// Timestamp (unix millis) when the entry was created
    pub timestamp: u64,
}

/// Operations carried by the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// A batch of mutations applied as one unit
    Write(Vec<Mutation>),

    /// A full state image replacing the store at this index
    Snapshot(Snapshot),

    /// Appended by a newly elected leader; raises the store generation
    Barrier,
}

/// A single key mutation inside a write batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Put a key-value pair
    Put { key: String, value: Vec<u8> },

    /// Delete a key
    Delete { key: String },
}

impl Entry {
    /// Create an entry stamped with the current time
    pub fn new(index: u64, generation: u64, operation: Operation) -> Self {
        Self {
            index,
            generation,
            operation,
            timestamp: unix_millis(),
        }
    }
}

impl Operation {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Write(_) => "write",
            Operation::Snapshot(_) => "snapshot",
            Operation::Barrier => "barrier",
        }
    }
}

impl Mutation {
    /// Convenience constructor for a put
    pub fn put(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Mutation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for a delete
    pub fn delete(key: impl Into<String>) -> Self {
        Mutation::Delete { key: key.into() }
    }

    /// The key this mutation touches
    pub fn key(&self) -> &str {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => key,
        }
    }
}

/// Milliseconds since the unix epoch
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
