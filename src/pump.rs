//! Event Pump
//!
//! Drains the consensus event stream on a dedicated thread so committed
//! entries are applied by exactly one sequential consumer.
//!
//! When apply halts with "needs resync" and a snapshot source is available,
//! the pump fetches a snapshot covering the offending entry, installs it and
//! continues.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;

use crate::error::{ReplError, Result};
use crate::log::LogEvent;
use crate::replica::ReplicatedState;
use crate::snapshot::SnapshotSource;

/// Spawn the applier thread for `state`
///
/// The thread exits when the channel disconnects or the instance is dropped.
pub fn spawn_applier(
    state: Arc<ReplicatedState>,
    events: Receiver<LogEvent>,
    source: Option<Arc<dyn SnapshotSource>>,
) -> Result<JoinHandle<()>> {
    let name = format!("applier-{}", state.config().instance_id);
    let handle = thread::Builder::new()
        .name(name)
        .spawn(move || run(&state, &events, source.as_deref()))?;
    Ok(handle)
}

fn run(state: &ReplicatedState, events: &Receiver<LogEvent>, source: Option<&dyn SnapshotSource>) {
    tracing::debug!(instance = %state.config().instance_id, "Applier started");

    for event in events.iter() {
        let resync_floor = match &event {
            LogEvent::Committed(entry) => Some(entry.index.saturating_sub(1)),
            _ => None,
        };

        match state.handle_event(&event, source) {
            Ok(()) => {}
            Err(ReplError::Dropped) => break,
            Err(e) if e.needs_resync() => {
                let (Some(source), Some(floor)) = (source, resync_floor) else {
                    tracing::warn!(error = %e, "Apply halted; waiting for snapshot");
                    continue;
                };
                if let Err(e) = resync(state, source, floor, &event) {
                    tracing::error!(error = %e, "Resync failed");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to handle log event");
            }
        }
    }

    tracing::debug!(instance = %state.config().instance_id, "Applier stopped");
}

/// Install a snapshot covering `floor`, then retry the rejected event
fn resync(
    state: &ReplicatedState,
    source: &dyn SnapshotSource,
    floor: u64,
    event: &LogEvent,
) -> Result<()> {
    let snapshot = source.fetch_snapshot(floor)?;
    tracing::info!(floor, snapshot = snapshot.index, "Resyncing from snapshot");
    state.install_snapshot(snapshot)?;
    state.handle_event(event, Some(source))
}
