//! In-process consensus log
//!
//! Stands in for a real consensus implementation. One log instance is shared
//! by every replica in the process; each replica subscribes with a node name
//! and receives `LogEvent`s over an unbounded crossbeam channel.

use std::collections::VecDeque;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{ReplError, Result};
use crate::machine::Role;

use super::{ConsensusLog, Entry, LogEvent, Operation};

/// A single-process replicated log with explicit commit control
///
/// ## Behaviour
/// - `propose` appends on behalf of the current leader generation
/// - `commit_through` / `sync_through` publish progress to all subscribers
/// - `elect` truncates the uncommitted tail (the deposed leader's entries are
///   lost, as when a new leader overwrites them) and appends a barrier
/// - `compact_through` drops a committed prefix; catch-up below it requires a
///   snapshot
///
/// With `auto_commit` every accepted entry is synced and committed at once.
pub struct LocalLog {
    inner: Mutex<LogInner>,
}

struct LogInner {
    /// Retained entries, `entries[0].index == first_index`
    entries: VecDeque<Entry>,

    /// Index of the first retained entry
    first_index: u64,

    /// Index of the last appended entry (0 when empty)
    last_index: u64,

    commit_index: u64,
    sync_index: u64,

    /// Current leader generation (0 before the first election)
    generation: u64,

    leader: Option<String>,
    auto_commit: bool,
    subscribers: Vec<(String, Sender<LogEvent>)>,
}

impl LocalLog {
    /// Create an empty log
    pub fn new(auto_commit: bool) -> Self {
        Self::with_base(0, auto_commit)
    }

    /// Create a log whose history through `base_index` is already compacted
    ///
    /// Used when replicas restart from a checkpoint at `base_index`.
    pub fn with_base(base_index: u64, auto_commit: bool) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: VecDeque::new(),
                first_index: base_index + 1,
                last_index: base_index,
                commit_index: base_index,
                sync_index: base_index,
                generation: 0,
                leader: None,
                auto_commit,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Subscribe `node` and replay everything committed after `applied_index`
    ///
    /// Subscription and replay happen under one lock so the stream has no gap.
    /// If the needed entries were compacted away the first event is
    /// `SnapshotRequired`.
    pub fn subscribe(&self, node: &str, applied_index: u64) -> Receiver<LogEvent> {
        let (tx, rx) = channel::unbounded();
        let mut inner = self.inner.lock();

        if let Some(leader) = inner.leader.clone() {
            let role = if leader == node { Role::Leader } else { Role::Follower };
            let _ = tx.send(LogEvent::LeadershipChanged {
                generation: inner.generation,
                role,
            });
        }

        inner.replay_to(&tx, applied_index);
        inner.subscribers.retain(|(name, _)| name != node);
        inner.subscribers.push((node.to_string(), tx));

        tracing::debug!(node, applied_index, "Subscribed to local log");
        rx
    }

    /// Elect `node` as leader under `generation`
    ///
    /// Returns the index of the barrier entry the new leader appends.
    pub fn elect(&self, node: &str, generation: u64) -> Result<u64> {
        let mut inner = self.inner.lock();
        if generation <= inner.generation {
            return Err(ReplError::Consensus(format!(
                "Generation {} is not above current generation {}",
                generation, inner.generation
            )));
        }

        let dropped = inner.truncate_uncommitted();
        if dropped > 0 {
            tracing::info!(dropped, generation, "Discarded uncommitted entries of deposed leader");
        }

        inner.generation = generation;
        inner.leader = Some(node.to_string());

        for (name, tx) in &inner.subscribers {
            let role = if name == node { Role::Leader } else { Role::Follower };
            let _ = tx.send(LogEvent::LeadershipChanged { generation, role });
        }

        tracing::info!(leader = node, generation, "Leader elected");
        Ok(inner.append(generation, Operation::Barrier))
    }

    /// Commit every appended entry up to `index`
    pub fn commit_through(&self, index: u64) {
        self.inner.lock().commit_through(index);
    }

    /// Mark every appended entry up to `index` durable
    pub fn sync_through(&self, index: u64) {
        self.inner.lock().sync_through(index);
    }

    /// Drop committed entries up to `index`
    pub fn compact_through(&self, index: u64) {
        let mut inner = self.inner.lock();
        let limit = index.min(inner.commit_index);
        while inner.first_index <= limit && !inner.entries.is_empty() {
            inner.entries.pop_front();
            inner.first_index += 1;
        }
        tracing::debug!(first_index = inner.first_index, "Compacted local log");
    }

    /// Index of the last appended entry
    pub fn last_index(&self) -> u64 {
        self.inner.lock().last_index
    }

    /// Index of the first entry still retained
    pub fn first_index(&self) -> u64 {
        self.inner.lock().first_index
    }

    /// Current leader generation
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Name of the current leader, if any
    pub fn leader(&self) -> Option<String> {
        self.inner.lock().leader.clone()
    }
}

impl ConsensusLog for LocalLog {
    fn propose(&self, generation: u64, operation: Operation) -> Result<u64> {
        let mut inner = self.inner.lock();
        if inner.leader.is_none() {
            return Err(ReplError::NotLeader);
        }
        if generation < inner.generation {
            return Err(ReplError::GenerationSuperseded {
                submitted: generation,
                current: inner.generation,
            });
        }
        if generation > inner.generation {
            return Err(ReplError::Consensus(format!(
                "Unknown generation {} (log is at {})",
                generation, inner.generation
            )));
        }
        Ok(inner.append(generation, operation))
    }

    fn commit_index(&self) -> u64 {
        self.inner.lock().commit_index
    }
}

impl LogInner {
    fn append(&mut self, generation: u64, operation: Operation) -> u64 {
        self.last_index += 1;
        let index = self.last_index;
        tracing::trace!(index, generation, kind = operation.kind(), "Appended entry");
        self.entries.push_back(Entry::new(index, generation, operation));

        if self.auto_commit {
            self.sync_through(index);
            self.commit_through(index);
        }
        index
    }

    fn entry(&self, index: u64) -> Option<&Entry> {
        if index < self.first_index {
            return None;
        }
        self.entries.get((index - self.first_index) as usize)
    }

    fn commit_through(&mut self, index: u64) {
        let target = index.min(self.last_index);
        while self.commit_index < target {
            let next = self.commit_index + 1;
            if let Some(entry) = self.entry(next).cloned() {
                self.broadcast(LogEvent::Committed(entry));
            }
            self.commit_index = next;
        }
    }

    fn sync_through(&mut self, index: u64) {
        let target = index.min(self.last_index);
        if target > self.sync_index {
            self.sync_index = target;
            self.broadcast(LogEvent::Synced(target));
        }
    }

    fn truncate_uncommitted(&mut self) -> u64 {
        let mut dropped = 0;
        while self.last_index > self.commit_index {
            if self.entries.pop_back().is_some() {
                dropped += 1;
            }
            self.last_index -= 1;
        }
        self.sync_index = self.sync_index.min(self.last_index);
        dropped
    }

    fn replay_to(&self, tx: &Sender<LogEvent>, applied_index: u64) {
        if applied_index >= self.commit_index {
            return;
        }
        if applied_index + 1 < self.first_index {
            let _ = tx.send(LogEvent::SnapshotRequired {
                index: self.first_index - 1,
            });
        }
        let start = (applied_index + 1).max(self.first_index);
        for index in start..=self.commit_index {
            if let Some(entry) = self.entry(index) {
                let _ = tx.send(LogEvent::Committed(entry.clone()));
            }
        }
        let _ = tx.send(LogEvent::Synced(self.sync_index.min(self.commit_index)));
    }

    fn broadcast(&mut self, event: LogEvent) {
        // Subscribers whose receiver is gone are pruned
        self.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}
