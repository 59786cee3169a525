//! State Machine Module
//!
//! The pieces that move the local store forward:
//!
//! - `Progress`: published applied / committed / synced indexes, leadership
//!   and health flags. Every blocking wait in the crate parks on it.
//! - `GenerationTracker`: `Following(g)` / `Leading(g)` transitions and fencing
//! - `LogEntryApplier`: strict in-order, exactly-once application
//!
//! ## Lock Order
//! store (`RwLock<KeyValueStore>`) before progress (`Mutex<ProgressState>`).
//! Waiters only ever hold the progress lock, never the store lock.

mod applier;
mod generation;
mod progress;

pub use applier::{ApplyOutcome, LogEntryApplier};
pub use generation::{GenerationTracker, LeadershipState, Role};
pub(crate) use generation::superseded;
pub(crate) use progress::{deadline_after, Progress, ProgressState};
