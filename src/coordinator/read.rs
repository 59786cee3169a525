//! Read Coordinator
//!
//! ## Consistency Tiers
//! - **Local**: no floor, serve whatever is applied now
//! - **Bounded staleness**: wait until `applied >= floor`, then serve
//! - **Linearizable**: leader only; wait until the consensus commit index at
//!   request time is applied, then confirm the generation did not move

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};
use crate::log::ConsensusLog;
use crate::machine::{deadline_after, superseded, GenerationTracker, Progress};
use crate::store::{KeyValueStore, Value};

/// Consistency requested by a reader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Serve from a state that includes at least this index
    pub read_from: Option<u64>,

    /// Wait until this index is applied before serving
    pub wait_for_applied: Option<u64>,

    /// Confirm leadership and read at the current commit index
    pub linearizable: bool,

    /// Overrides the configured read timeout
    pub timeout: Option<Duration>,
}

impl ReadOptions {
    /// Read-your-writes from `index`
    pub fn from_index(index: u64) -> Self {
        Self {
            read_from: Some(index),
            ..Self::default()
        }
    }

    pub fn linearizable() -> Self {
        Self {
            linearizable: true,
            ..Self::default()
        }
    }

    /// Effective applied-index floor
    pub fn floor(&self) -> Option<u64> {
        match (self.read_from, self.wait_for_applied) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Values for a multi-get, in request order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Applied index the values were read at
    pub index: u64,

    /// `None` marks an absent key
    pub values: Vec<(String, Option<Value>)>,
}

impl ReadResult {
    /// Value for `key`, flattening "absent" and "not requested"
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }
}

/// Serves read batches under the requested consistency
pub struct ReadCoordinator {
    store: Arc<RwLock<KeyValueStore>>,
    log: Arc<dyn ConsensusLog>,
    tracker: GenerationTracker,
    progress: Arc<Progress>,
    default_timeout: Duration,
}

impl ReadCoordinator {
    pub(crate) fn new(
        store: Arc<RwLock<KeyValueStore>>,
        log: Arc<dyn ConsensusLog>,
        tracker: GenerationTracker,
        progress: Arc<Progress>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            store,
            log,
            tracker,
            progress,
            default_timeout,
        }
    }

    pub fn read(&self, keys: &[String], options: &ReadOptions) -> Result<ReadResult> {
        let deadline = deadline_after(options.timeout.unwrap_or(self.default_timeout));

        if options.linearizable {
            return self.read_linearizable(keys, options, deadline);
        }

        if let Some(floor) = options.floor() {
            self.wait_applied(floor, deadline, None)?;
        }
        self.serve(keys)
    }

    fn read_linearizable(
        &self,
        keys: &[String],
        options: &ReadOptions,
        deadline: Instant,
    ) -> Result<ReadResult> {
        let generation = self.tracker.leading_generation()?;
        let read_index = self
            .log
            .commit_index()
            .max(options.floor().unwrap_or(0));

        self.wait_applied(read_index, deadline, Some(generation))?;
        let result = self.serve(keys)?;

        // Leadership may have moved while we were serving
        self.tracker.ensure_current(generation)?;
        Ok(result)
    }

    /// Block until `applied >= floor`
    fn wait_applied(&self, floor: u64, deadline: Instant, fence: Option<u64>) -> Result<()> {
        let what = format!("applied index {}", floor);
        self.progress.wait_until(deadline, &what, |state| {
            if state.applied_index >= floor {
                return Some(Ok(()));
            }
            fence.and_then(|generation| superseded(state, generation).map(Err))
        })
    }

    fn serve(&self, keys: &[String]) -> Result<ReadResult> {
        if self.progress.read(|s| s.dropped) {
            return Err(ReplError::Dropped);
        }

        let store = self.store.read();
        let values = keys
            .iter()
            .map(|key| (key.clone(), store.get(key).cloned()))
            .collect();

        Ok(ReadResult {
            index: store.applied_index(),
            values,
        })
    }
}
