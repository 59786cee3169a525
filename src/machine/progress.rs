//! Progress monitor
//!
//! Mutex + Condvar pair holding everything coordinators wait on.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ReplError, Result};

use super::LeadershipState;

/// Fenced indexes remembered for waiting writers
const FENCED_HISTORY: usize = 1024;

/// Longest wait a caller may request; larger timeouts are capped
pub(crate) const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline `timeout` from now, capped at `MAX_WAIT`
///
/// Timeouts arrive from clients, so the addition must not overflow.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout.min(MAX_WAIT)
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ProgressState {
    pub applied_index: u64,
    pub committed_index: u64,
    pub synced_index: u64,
    pub leadership: LeadershipState,
    pub needs_resync: bool,
    pub dropped: bool,
    fenced: VecDeque<u64>,
}

impl ProgressState {
    /// Whether the entry at `index` was skipped as coming from a stale leader
    pub fn is_fenced(&self, index: u64) -> bool {
        self.fenced.contains(&index)
    }

    pub fn record_fenced(&mut self, index: u64) {
        if self.fenced.len() == FENCED_HISTORY {
            self.fenced.pop_front();
        }
        self.fenced.push_back(index);
    }

    pub fn reset(&mut self) {
        self.applied_index = 0;
        self.committed_index = 0;
        self.synced_index = 0;
        self.needs_resync = false;
        self.fenced.clear();
    }
}

#[derive(Debug, Default)]
pub(crate) struct Progress {
    state: Mutex<ProgressState>,
    changed: Condvar,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field without waiting
    pub fn read<T>(&self, f: impl FnOnce(&ProgressState) -> T) -> T {
        f(&self.state.lock())
    }

    /// Mutate and wake every waiter
    pub fn update<T>(&self, f: impl FnOnce(&mut ProgressState) -> T) -> T {
        let result = f(&mut self.state.lock());
        self.changed.notify_all();
        result
    }

    /// Block until `check` yields a result or `deadline` passes
    ///
    /// `check` runs under the progress lock after every change. A dropped
    /// instance always ends the wait with `Dropped`.
    pub fn wait_until<T>(
        &self,
        deadline: Instant,
        what: &str,
        mut check: impl FnMut(&ProgressState) -> Option<Result<T>>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        loop {
            if state.dropped {
                return Err(ReplError::Dropped);
            }
            if let Some(result) = check(&state) {
                return result;
            }
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                if state.dropped {
                    return Err(ReplError::Dropped);
                }
                return match check(&state) {
                    Some(result) => result,
                    None => Err(ReplError::Timeout(what.to_string())),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_wakes_on_update() {
        let progress = Arc::new(Progress::new());
        let waiter = {
            let progress = Arc::clone(&progress);
            thread::spawn(move || {
                let deadline = Instant::now() + Duration::from_secs(5);
                progress.wait_until(deadline, "index 3", |s| {
                    (s.applied_index >= 3).then(|| Ok(s.applied_index))
                })
            })
        };

        thread::sleep(Duration::from_millis(20));
        progress.update(|s| s.applied_index = 3);

        assert_eq!(waiter.join().unwrap().unwrap(), 3);
    }

    #[test]
    fn test_wait_times_out() {
        let progress = Progress::new();
        let deadline = Instant::now() + Duration::from_millis(20);

        let result: Result<()> = progress.wait_until(deadline, "never", |_| None);

        assert!(matches!(result, Err(ReplError::Timeout(ref what)) if what == "never"));
    }

    #[test]
    fn test_dropped_ends_wait() {
        let progress = Progress::new();
        progress.update(|s| s.dropped = true);
        let deadline = Instant::now() + Duration::from_secs(5);

        let result: Result<()> = progress.wait_until(deadline, "anything", |_| None);

        assert!(matches!(result, Err(ReplError::Dropped)));
    }

    #[test]
    fn test_huge_timeout_is_capped() {
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline <= Instant::now() + MAX_WAIT);
    }

    #[test]
    fn test_fenced_history_is_bounded() {
        let mut state = ProgressState::default();
        for index in 0..(FENCED_HISTORY as u64 + 10) {
            state.record_fenced(index);
        }
        assert!(!state.is_fenced(0));
        assert!(state.is_fenced(FENCED_HISTORY as u64 + 9));
    }
}
