//! Replicated State Instance
//!
//! The handle clients and the consensus layer talk to.
//!
//! ## Responsibilities
//! - Own the store, progress monitor and every component built on them
//! - Expose write / multi_get / get_snapshot / drop to clients
//! - Accept committed entries, sync progress, leadership changes and
//!   snapshot requests from the consensus layer
//! - Checkpoint to disk every `checkpoint_interval` applied entries

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::coordinator::{ReadCoordinator, ReadOptions, ReadResult, WriteCoordinator, WriteOptions};
use crate::error::{ReplError, Result};
use crate::log::{ConsensusLog, Entry, LogEvent, Mutation};
use crate::machine::{deadline_after, ApplyOutcome, GenerationTracker, LogEntryApplier, Progress, Role};
use crate::snapshot::{Snapshot, SnapshotManager, SnapshotSource};
use crate::status::{ManagerState, StatusReport};
use crate::store::KeyValueStore;

/// One replicated key-value state machine instance
///
/// ## Concurrency Model
/// - **Apply / install / drop**: exclusive store lock, one at a time. The
///   event pump is the only caller of `on_committed_entry` in production.
/// - **Reads / produce**: shared store lock, concurrent with each other
/// - **Waits**: on the progress monitor, never holding the store lock
pub struct ReplicatedState {
    config: Config,
    store: Arc<RwLock<KeyValueStore>>,
    progress: Arc<Progress>,
    tracker: GenerationTracker,
    applier: LogEntryApplier,
    snapshots: SnapshotManager,
    writes: WriteCoordinator,
    reads: ReadCoordinator,

    /// Entries applied since the last checkpoint
    since_checkpoint: AtomicU64,
}

impl ReplicatedState {
    /// Open an instance on top of `log`
    ///
    /// With a data directory configured, the last checkpoint is restored so
    /// the caller can resubscribe to the log from `applied_index()`.
    pub fn open(config: Config, log: Arc<dyn ConsensusLog>) -> Result<Self> {
        if config.instance_id.is_empty() {
            return Err(ReplError::Config("Instance id must not be empty".to_string()));
        }

        let store = Arc::new(RwLock::new(KeyValueStore::new()));
        let progress = Arc::new(Progress::new());
        let tracker = GenerationTracker::new(Arc::clone(&progress));

        let applier = LogEntryApplier::new(Arc::clone(&store), Arc::clone(&progress));
        let snapshots = SnapshotManager::new(
            Arc::clone(&store),
            Arc::clone(&progress),
            config.snapshot_path(),
        );
        let writes = WriteCoordinator::new(
            Arc::clone(&log),
            tracker.clone(),
            Arc::clone(&progress),
            config.write_timeout(),
        );
        let reads = ReadCoordinator::new(
            Arc::clone(&store),
            log,
            tracker.clone(),
            Arc::clone(&progress),
            config.read_timeout(),
        );

        let state = Self {
            config,
            store,
            progress,
            tracker,
            applier,
            snapshots,
            writes,
            reads,
            since_checkpoint: AtomicU64::new(0),
        };

        if let Some(index) = state.snapshots.restore()? {
            tracing::info!(
                database = %state.config.database,
                instance = %state.config.instance_id,
                index,
                "Instance restored"
            );
        }

        Ok(state)
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Submit a write batch; returns the assigned log index
    pub fn write(&self, batch: Vec<Mutation>, options: &WriteOptions) -> Result<u64> {
        self.writes.write(batch, options)
    }

    /// Read several keys; absent keys come back as `None`
    pub fn multi_get(&self, keys: &[String], options: &ReadOptions) -> Result<ReadResult> {
        self.reads.read(keys, options)
    }

    /// Snapshot of the current state, optionally after `wait_for_index` is applied
    pub fn get_snapshot(&self, wait_for_index: Option<u64>) -> Result<Snapshot> {
        if let Some(index) = wait_for_index {
            let deadline = deadline_after(self.config.read_timeout());
            let what = format!("snapshot at index {}", index);
            self.progress
                .wait_until(deadline, &what, |s| (s.applied_index >= index).then_some(Ok(())))?;
        }
        if self.progress.read(|s| s.dropped) {
            return Err(ReplError::Dropped);
        }
        Ok(self.snapshots.produce())
    }

    /// Discard all local state. Idempotent.
    ///
    /// Pending waits end with `Dropped`; later operations fail the same way.
    pub fn drop_instance(&self) -> Result<()> {
        let mut store = self.store.write();
        let already = self.progress.update(|s| {
            let already = s.dropped;
            s.dropped = true;
            s.reset();
            already
        });
        store.clear();
        drop(store);

        self.snapshots.discard()?;
        if !already {
            tracing::info!(
                database = %self.config.database,
                instance = %self.config.instance_id,
                "Instance dropped"
            );
        }
        Ok(())
    }

    /// Persist a checkpoint now (no-op without a data directory)
    pub fn checkpoint(&self) -> Result<Option<u64>> {
        let result = self.snapshots.checkpoint()?;
        self.since_checkpoint.store(0, Ordering::Relaxed);
        Ok(result)
    }

    // =========================================================================
    // Inbound From The Consensus Layer
    // =========================================================================

    /// Apply the next committed entry
    ///
    /// The commit index is published by the applier together with the apply
    /// decision, so a commit-only writer never sees its entry committed
    /// before it is known whether the entry was fenced.
    pub fn on_committed_entry(&self, entry: &Entry) -> Result<ApplyOutcome> {
        let outcome = self.applier.apply(entry)?;
        if outcome != ApplyOutcome::Replayed {
            self.maybe_checkpoint();
        }
        Ok(outcome)
    }

    /// Entries up to `index` are durable on stable storage
    pub fn on_synced(&self, index: u64) {
        self.progress
            .update(|s| s.synced_index = s.synced_index.max(index));
    }

    /// Leadership moved; returns `false` for stale notifications
    pub fn on_leadership_change(&self, generation: u64, role: Role) -> bool {
        self.tracker.transition(generation, role)
    }

    /// The log dropped entries up to `index`; fetch and install a snapshot
    pub fn on_snapshot_required(&self, index: u64, source: &dyn SnapshotSource) -> Result<()> {
        if self.applied_index() >= index && !self.needs_resync() {
            return Ok(());
        }

        tracing::info!(index, applied = self.applied_index(), "Fetching snapshot");
        let snapshot = source.fetch_snapshot(index)?;
        if snapshot.index < index {
            return Err(ReplError::SnapshotRegression {
                applied: index,
                snapshot: snapshot.index,
            });
        }
        self.snapshots.install(snapshot)?;
        self.checkpoint()?;
        Ok(())
    }

    /// Install a snapshot received out of band
    pub fn install_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots.install(snapshot)
    }

    /// Dispatch one consensus event
    pub fn handle_event(&self, event: &LogEvent, source: Option<&dyn SnapshotSource>) -> Result<()> {
        match *event {
            LogEvent::Committed(ref entry) => self.on_committed_entry(entry).map(|_| ()),
            LogEvent::Synced(index) => {
                self.on_synced(index);
                Ok(())
            }
            LogEvent::LeadershipChanged { generation, role } => {
                self.on_leadership_change(generation, role);
                Ok(())
            }
            LogEvent::SnapshotRequired { index } => match source {
                Some(source) => self.on_snapshot_required(index, source),
                None => {
                    self.progress.update(|s| s.needs_resync = true);
                    Err(ReplError::NeedsResync {
                        applied: self.applied_index(),
                    })
                }
            },
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn status(&self) -> StatusReport {
        let (leadership, applied, committed, needs_resync, dropped) = self.progress.read(|s| {
            (
                s.leadership,
                s.applied_index,
                s.committed_index,
                s.needs_resync,
                s.dropped,
            )
        });

        StatusReport {
            database: self.config.database.clone(),
            instance_id: self.config.instance_id.clone(),
            role: leadership.role(),
            generation: leadership.generation(),
            manager_state: ManagerState::derive(leadership, applied, committed, needs_resync, dropped),
            applied_index: applied,
            committed_index: committed,
            snapshot: self.snapshots.report(),
        }
    }

    pub fn applied_index(&self) -> u64 {
        self.progress.read(|s| s.applied_index)
    }

    /// Current generation as reported by the consensus layer
    pub fn generation(&self) -> u64 {
        self.tracker.generation()
    }

    pub fn needs_resync(&self) -> bool {
        self.progress.read(|s| s.needs_resync)
    }

    pub fn is_dropped(&self) -> bool {
        self.progress.read(|s| s.dropped)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn maybe_checkpoint(&self) {
        let interval = self.config.checkpoint_interval;
        if interval == 0 || self.config.data_dir.is_none() {
            return;
        }
        let applied = self.since_checkpoint.fetch_add(1, Ordering::Relaxed) + 1;
        if applied >= interval {
            if let Err(e) = self.checkpoint() {
                // The log still holds the entries; the next interval retries
                tracing::warn!(error = %e, "Periodic checkpoint failed");
            }
        }
    }
}

impl SnapshotSource for ReplicatedState {
    fn fetch_snapshot(&self, min_index: u64) -> Result<Snapshot> {
        self.get_snapshot(Some(min_index))
    }
}
