//! Generation Tracker
//!
//! Follows leadership changes reported by the consensus layer and fences
//! operations started under an older generation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};

use super::{Progress, ProgressState};

/// Local role reported by the consensus layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
}

/// Leadership as last reported by the consensus layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeadershipState {
    /// No leadership notification received yet
    #[default]
    Unknown,

    /// Another node leads `generation`
    Following(u64),

    /// This node leads `generation`
    Leading(u64),
}

impl LeadershipState {
    pub fn generation(&self) -> u64 {
        match self {
            LeadershipState::Unknown => 0,
            LeadershipState::Following(g) | LeadershipState::Leading(g) => *g,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            LeadershipState::Unknown => None,
            LeadershipState::Following(_) => Some(Role::Follower),
            LeadershipState::Leading(_) => Some(Role::Leader),
        }
    }
}

/// Tracks `Following(g)` / `Leading(g)` and fences stale generations
#[derive(Clone)]
pub struct GenerationTracker {
    progress: Arc<Progress>,
}

impl GenerationTracker {
    pub(crate) fn new(progress: Arc<Progress>) -> Self {
        Self { progress }
    }

    /// Current leadership state
    pub fn current(&self) -> LeadershipState {
        self.progress.read(|s| s.leadership)
    }

    /// Current generation (0 before the first notification)
    pub fn generation(&self) -> u64 {
        self.current().generation()
    }

    /// Apply a leadership notification
    ///
    /// The generation must strictly increase; stale or repeated notifications
    /// are ignored and `false` is returned. Every waiter is woken so writes
    /// holding the previous generation fail promptly.
    pub fn transition(&self, generation: u64, role: Role) -> bool {
        self.progress.update(|state| {
            let previous = state.leadership;
            if generation <= previous.generation() {
                tracing::warn!(
                    generation,
                    current = previous.generation(),
                    "Ignoring stale leadership notification"
                );
                return false;
            }

            state.leadership = match role {
                Role::Leader => LeadershipState::Leading(generation),
                Role::Follower => LeadershipState::Following(generation),
            };
            tracing::info!(?previous, current = ?state.leadership, "Leadership changed");
            true
        })
    }

    /// Generation this node currently leads, or `NotLeader`
    pub fn leading_generation(&self) -> Result<u64> {
        match self.current() {
            LeadershipState::Leading(generation) => Ok(generation),
            _ => Err(ReplError::NotLeader),
        }
    }

    /// Fail unless this node still leads `submitted`
    pub fn ensure_current(&self, submitted: u64) -> Result<()> {
        match self.progress.read(|s| superseded(s, submitted)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// `GenerationSuperseded` if leadership has moved past `submitted`
pub(crate) fn superseded(state: &ProgressState, submitted: u64) -> Option<ReplError> {
    match state.leadership {
        LeadershipState::Leading(g) if g == submitted => None,
        other => Some(ReplError::GenerationSuperseded {
            submitted,
            current: other.generation(),
        }),
    }
}
