//! Error types for replikv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ReplError
pub type Result<T> = std::result::Result<T, ReplError>;

/// Unified error type for replikv operations
#[derive(Debug, Error)]
pub enum ReplError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    // -------------------------------------------------------------------------
    // Protocol Violations (halt local apply until resynchronized)
    // -------------------------------------------------------------------------
    #[error("Out-of-order entry: expected index {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Snapshot regression: snapshot index {snapshot} is not above applied index {applied}")]
    SnapshotRegression { applied: u64, snapshot: u64 },

    #[error("Instance needs resync via snapshot (applied index {applied})")]
    NeedsResync { applied: u64 },

    // -------------------------------------------------------------------------
    // Leadership Errors (retry against the current leader)
    // -------------------------------------------------------------------------
    #[error("Not leader")]
    NotLeader,

    #[error("Generation superseded: submitted under {submitted}, current is {current}")]
    GenerationSuperseded { submitted: u64, current: u64 },

    // -------------------------------------------------------------------------
    // Timeouts (outcome unknown)
    // -------------------------------------------------------------------------
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    // -------------------------------------------------------------------------
    // Instance Lifecycle
    // -------------------------------------------------------------------------
    #[error("Instance has been dropped")]
    Dropped,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // -------------------------------------------------------------------------
    // Consensus Boundary
    // -------------------------------------------------------------------------
    #[error("Consensus error: {0}")]
    Consensus(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReplError {
    /// Whether the caller may retry (possibly against another node)
    ///
    /// A retried write after `Timeout` may be applied twice; the caller
    /// decides whether that is acceptable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReplError::NotLeader | ReplError::GenerationSuperseded { .. } | ReplError::Timeout(_)
        )
    }

    /// Whether the error is a protocol violation that requires a snapshot
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            ReplError::OutOfOrder { .. } | ReplError::NeedsResync { .. }
        )
    }
}

impl From<bincode::Error> for ReplError {
    fn from(e: bincode::Error) -> Self {
        ReplError::Serialization(e.to_string())
    }
}
