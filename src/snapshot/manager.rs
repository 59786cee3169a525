//! Snapshot Manager
//!
//! Produces consistent snapshots, installs received ones, and checkpoints
//! the store to disk.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};
use crate::log::unix_millis;
use crate::machine::Progress;
use crate::store::KeyValueStore;

use super::Snapshot;

/// Lifecycle of the most recent snapshot transfer or checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    Uninitialized,
    InProgress,
    Completed,
    Failed,
}

/// Snapshot status with the time of its last change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub status: SnapshotStatus,
    /// Unix millis of the last status change (0 if never)
    pub timestamp_ms: u64,
    /// Index of the last installed or checkpointed snapshot
    pub index: u64,
}

impl Default for SnapshotReport {
    fn default() -> Self {
        Self {
            status: SnapshotStatus::Uninitialized,
            timestamp_ms: 0,
            index: 0,
        }
    }
}

/// Produces and installs snapshots of the owning replica's store
///
/// ## Concurrency
/// - `produce` holds the store's shared lock: concurrent with reads, never
///   with an in-flight apply
/// - `install` holds the exclusive lock for the whole replacement
pub struct SnapshotManager {
    store: Arc<RwLock<KeyValueStore>>,
    progress: Arc<Progress>,

    /// `{data_dir}/snapshot.bin`, when persistence is enabled
    path: Option<PathBuf>,

    report: Mutex<SnapshotReport>,
}

impl SnapshotManager {
    pub(crate) fn new(
        store: Arc<RwLock<KeyValueStore>>,
        progress: Arc<Progress>,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            progress,
            path,
            report: Mutex::new(SnapshotReport::default()),
        }
    }

    /// Take a consistent cut of the store
    pub fn produce(&self) -> Snapshot {
        let store = self.store.read();
        Snapshot::new(store.applied_index(), store.generation(), store.dump())
    }

    /// Replace the store with `snapshot`
    ///
    /// Rejects a snapshot that is not strictly ahead of the local applied
    /// index. Clears a pending "needs resync" condition on success.
    pub fn install(&self, snapshot: Snapshot) -> Result<()> {
        self.set_status(SnapshotStatus::InProgress, None);

        let mut store = self.store.write();
        if self.progress.read(|s| s.dropped) {
            self.set_status(SnapshotStatus::Failed, None);
            return Err(ReplError::Dropped);
        }

        let applied = store.applied_index();
        if snapshot.index <= applied {
            drop(store);
            self.set_status(SnapshotStatus::Failed, None);
            tracing::warn!(applied, snapshot = snapshot.index, "Rejecting snapshot regression");
            return Err(ReplError::SnapshotRegression {
                applied,
                snapshot: snapshot.index,
            });
        }

        let index = snapshot.index;
        let generation = store.generation().max(snapshot.generation);
        let keys = snapshot.entries.len();
        store.replace(index, generation, snapshot.entries);

        self.progress.update(|s| {
            s.applied_index = index;
            s.committed_index = s.committed_index.max(index);
            s.synced_index = s.synced_index.max(index);
            s.needs_resync = false;
        });
        drop(store);

        self.set_status(SnapshotStatus::Completed, Some(index));
        tracing::info!(index, generation, keys, "Installed snapshot");
        Ok(())
    }

    /// Persist the current state. Returns the checkpointed index, or `None`
    /// when persistence is disabled.
    pub fn checkpoint(&self) -> Result<Option<u64>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let snapshot = self.produce();
        match snapshot.write_to(path) {
            Ok(()) => {
                tracing::debug!(index = snapshot.index, path = %path.display(), "Checkpoint written");
                self.set_status(SnapshotStatus::Completed, Some(snapshot.index));
                Ok(Some(snapshot.index))
            }
            Err(e) => {
                tracing::error!(error = %e, "Checkpoint failed");
                self.set_status(SnapshotStatus::Failed, None);
                Err(e)
            }
        }
    }

    /// Load the persisted checkpoint, if any. Returns the restored index.
    pub fn restore(&self) -> Result<Option<u64>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let snapshot = Snapshot::read_from(path)?;
        if snapshot.index == 0 {
            return Ok(None);
        }

        let index = snapshot.index;
        self.install(snapshot)?;
        tracing::info!(index, "Restored from checkpoint");
        Ok(Some(index))
    }

    /// Delete the persisted checkpoint and forget status
    pub fn discard(&self) -> Result<()> {
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        *self.report.lock() = SnapshotReport::default();
        Ok(())
    }

    /// Status of the last snapshot operation
    pub fn report(&self) -> SnapshotReport {
        *self.report.lock()
    }

    fn set_status(&self, status: SnapshotStatus, index: Option<u64>) {
        let mut report = self.report.lock();
        report.status = status;
        report.timestamp_ms = unix_millis();
        if let Some(index) = index {
            report.index = index;
        }
    }
}
