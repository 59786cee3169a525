//! Status reporting
//!
//! Operational health surface. Clients must not base correctness decisions
//! on it.

use serde::{Deserialize, Serialize};

use crate::machine::{LeadershipState, Role};
use crate::snapshot::SnapshotReport;

/// What the instance is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerState {
    /// No leadership notification received yet
    WaitingForLeadership,

    /// Leader accepting writes
    ServiceAvailable,

    /// Follower with everything committed applied
    NothingToApply,

    /// Follower behind the commit index
    ApplyingEntries,

    /// Apply halted after a protocol violation
    NeedsResync,

    Dropped,
}

/// Point-in-time view of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub database: String,
    pub instance_id: String,
    pub role: Option<Role>,
    pub generation: u64,
    pub manager_state: ManagerState,
    pub applied_index: u64,
    pub committed_index: u64,
    pub snapshot: SnapshotReport,
}

impl ManagerState {
    pub(crate) fn derive(
        leadership: LeadershipState,
        applied_index: u64,
        committed_index: u64,
        needs_resync: bool,
        dropped: bool,
    ) -> Self {
        if dropped {
            return ManagerState::Dropped;
        }
        if needs_resync {
            return ManagerState::NeedsResync;
        }
        match leadership {
            LeadershipState::Unknown => ManagerState::WaitingForLeadership,
            LeadershipState::Leading(_) => ManagerState::ServiceAvailable,
            LeadershipState::Following(_) if applied_index >= committed_index => {
                ManagerState::NothingToApply
            }
            LeadershipState::Following(_) => ManagerState::ApplyingEntries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_wins_over_everything() {
        let state = ManagerState::derive(LeadershipState::Leading(3), 0, 5, true, true);
        assert_eq!(state, ManagerState::Dropped);
    }

    #[test]
    fn test_follower_states() {
        let lagging = ManagerState::derive(LeadershipState::Following(2), 3, 5, false, false);
        let caught_up = ManagerState::derive(LeadershipState::Following(2), 5, 5, false, false);

        assert_eq!(lagging, ManagerState::ApplyingEntries);
        assert_eq!(caught_up, ManagerState::NothingToApply);
    }
}
