//! Log Entry Applier
//!
//! Single sequential consumer of committed entries.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ReplError, Result};
use crate::log::{Entry, Operation};
use crate::store::KeyValueStore;

use super::Progress;

/// What `apply` did with an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Mutation visible in the store
    Applied,

    /// Index already applied; nothing changed
    Replayed,

    /// Entry from a superseded leader; index advanced, data untouched
    Fenced,
}

/// Applies committed entries to the store exactly once, in index order
///
/// ## Rules
/// - `index <= applied`: replay, no-op
/// - `index == applied + 1`: apply
/// - anything else: protocol violation, instance needs resync
/// - `generation < store.generation`: fenced, position advances only
///
/// An empty store expects index 1. Accepting an arbitrary first index would
/// let a replica skip entries another replica applied, so a fresh instance
/// that starts mid-log must install a snapshot first.
///
/// The commit index is published in the same progress update as the
/// applied index and any fenced mark.
pub struct LogEntryApplier {
    store: Arc<RwLock<KeyValueStore>>,
    progress: Arc<Progress>,
}

impl LogEntryApplier {
    pub(crate) fn new(store: Arc<RwLock<KeyValueStore>>, progress: Arc<Progress>) -> Self {
        Self { store, progress }
    }

    /// Apply the next committed entry
    pub fn apply(&self, entry: &Entry) -> Result<ApplyOutcome> {
        let mut store = self.store.write();
        let applied = store.applied_index();

        let (dropped, needs_resync) = self.progress.read(|s| (s.dropped, s.needs_resync));
        if dropped {
            return Err(ReplError::Dropped);
        }
        if needs_resync {
            self.progress.update(|s| s.committed_index = s.committed_index.max(entry.index));
            return Err(ReplError::NeedsResync { applied });
        }

        if entry.index <= applied {
            tracing::trace!(index = entry.index, applied, "Skipping replayed entry");
            return Ok(ApplyOutcome::Replayed);
        }

        if entry.index != applied + 1 {
            drop(store);
            self.progress.update(|s| {
                s.needs_resync = true;
                s.committed_index = s.committed_index.max(entry.index);
            });
            tracing::error!(
                expected = applied + 1,
                got = entry.index,
                "Out-of-order entry; halting apply until resync"
            );
            return Err(ReplError::OutOfOrder {
                expected: applied + 1,
                got: entry.index,
            });
        }

        let outcome = if entry.generation < store.generation() {
            tracing::warn!(
                index = entry.index,
                entry_generation = entry.generation,
                store_generation = store.generation(),
                "Fencing entry from superseded leader"
            );
            let generation = store.generation();
            store.advance(entry.index, generation);
            ApplyOutcome::Fenced
        } else {
            match &entry.operation {
                Operation::Write(batch) => {
                    store.apply_batch(entry.index, entry.generation, batch);
                }
                Operation::Barrier => {
                    store.advance(entry.index, entry.generation);
                }
                Operation::Snapshot(snapshot) => {
                    let generation = entry.generation.max(snapshot.generation);
                    store.replace(entry.index, generation, snapshot.entries.clone());
                }
            }
            ApplyOutcome::Applied
        };

        // Published while the store lock is held so waiters never see an
        // index whose data is not yet readable
        self.progress.update(|s| {
            s.applied_index = entry.index;
            s.committed_index = s.committed_index.max(entry.index);
            if outcome == ApplyOutcome::Fenced {
                s.record_fenced(entry.index);
            }
        });

        tracing::trace!(index = entry.index, kind = entry.operation.kind(), ?outcome, "Applied entry");
        Ok(outcome)
    }
}
