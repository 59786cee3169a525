//! Write Coordinator

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};
use crate::log::{ConsensusLog, Mutation, Operation};
use crate::machine::{deadline_after, superseded, GenerationTracker, Progress};

/// Durability milestones a writer waits for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Entry durable on local stable storage
    pub wait_for_sync: bool,

    /// Entry committed by quorum. `false` returns once the leader accepted it.
    pub wait_for_commit: bool,

    /// Entry applied to the local store (visible to local reads)
    pub wait_for_applied: bool,

    /// Overrides the configured write timeout
    pub timeout: Option<Duration>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            wait_for_sync: false,
            wait_for_commit: true,
            wait_for_applied: false,
            timeout: None,
        }
    }
}

impl WriteOptions {
    /// Wait until the write is visible locally
    pub fn applied() -> Self {
        Self {
            wait_for_applied: true,
            ..Self::default()
        }
    }

    /// Return as soon as the leader accepted the entry
    pub fn fire_and_forget() -> Self {
        Self {
            wait_for_commit: false,
            ..Self::default()
        }
    }

    fn waits(&self) -> bool {
        self.wait_for_sync || self.wait_for_commit || self.wait_for_applied
    }
}

/// Submits write batches through the consensus leader
pub struct WriteCoordinator {
    log: Arc<dyn ConsensusLog>,
    tracker: GenerationTracker,
    progress: Arc<Progress>,
    default_timeout: Duration,
}

impl WriteCoordinator {
    pub(crate) fn new(
        log: Arc<dyn ConsensusLog>,
        tracker: GenerationTracker,
        progress: Arc<Progress>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            log,
            tracker,
            progress,
            default_timeout,
        }
    }

    /// Submit `batch` as one entry and wait for the requested milestones
    ///
    /// Returns the assigned log index. On `Timeout` the entry may still
    /// commit and apply later.
    pub fn write(&self, batch: Vec<Mutation>, options: &WriteOptions) -> Result<u64> {
        validate(&batch)?;
        if self.progress.read(|s| s.dropped) {
            return Err(ReplError::Dropped);
        }

        let generation = self.tracker.leading_generation()?;
        let index = self.log.propose(generation, Operation::Write(batch))?;
        tracing::debug!(index, generation, "Write accepted by leader");

        if !options.waits() {
            return Ok(index);
        }

        let deadline = deadline_after(options.timeout.unwrap_or(self.default_timeout));
        let what = format!("write {} milestones", index);

        self.progress.wait_until(deadline, &what, |state| {
            if state.is_fenced(index) {
                return Some(Err(ReplError::GenerationSuperseded {
                    submitted: generation,
                    current: state.leadership.generation(),
                }));
            }
            let committed = !options.wait_for_commit || state.committed_index >= index;
            let synced = !options.wait_for_sync || state.synced_index >= index;
            let applied = !options.wait_for_applied || state.applied_index >= index;
            if committed && synced && applied {
                return Some(Ok(index));
            }

            if let Some(err) = superseded(state, generation) {
                tracing::debug!(index, generation, "Write superseded by leadership change");
                return Some(Err(err));
            }
            if options.wait_for_applied && state.needs_resync {
                return Some(Err(ReplError::NeedsResync {
                    applied: state.applied_index,
                }));
            }
            None
        })
    }
}

fn validate(batch: &[Mutation]) -> Result<()> {
    if batch.is_empty() {
        return Err(ReplError::InvalidRequest("Empty write batch".to_string()));
    }
    if batch.iter().any(|m| m.key().is_empty()) {
        return Err(ReplError::InvalidRequest("Empty key in write batch".to_string()));
    }
    Ok(())
}
