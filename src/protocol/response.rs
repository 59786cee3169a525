//! Response definitions
//!
//! A closed set of tagged outcomes, decoded explicitly at the boundary.

use serde::{Deserialize, Serialize};

use crate::coordinator::ReadResult;
use crate::error::{ReplError, Result};
use crate::snapshot::{Snapshot, SnapshotChunk};
use crate::status::StatusReport;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    NotLeader = 0x03,
    GenerationSuperseded = 0x04,
    Timeout = 0x05,
    Dropped = 0x06,
    NeedsResync = 0x07,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            0x03 => Some(Status::NotLeader),
            0x04 => Some(Status::GenerationSuperseded),
            0x05 => Some(Status::Timeout),
            0x06 => Some(Status::Dropped),
            0x07 => Some(Status::NeedsResync),
            _ => None,
        }
    }
}

/// Successful payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Written { index: u64 },
    Values(ReadResult),
    Snapshot(Snapshot),
    Chunk(SnapshotChunk),
    Status(StatusReport),
    Dropped,
    Pong,
}

/// A response to send to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok(Reply),

    /// The requested resource (e.g. a pinned snapshot) no longer exists
    NotFound,

    NotLeader,
    GenerationSuperseded { submitted: u64, current: u64 },
    Timeout(String),

    /// The instance was dropped; it will not serve again
    Dropped,

    /// Apply is halted until the instance installs a snapshot
    NeedsResync { applied: u64 },

    Error(String),
}

impl Response {
    /// Status byte for the frame header
    pub fn status(&self) -> Status {
        match self {
            Response::Ok(_) => Status::Ok,
            Response::NotFound => Status::NotFound,
            Response::NotLeader => Status::NotLeader,
            Response::GenerationSuperseded { .. } => Status::GenerationSuperseded,
            Response::Timeout(_) => Status::Timeout,
            Response::Dropped => Status::Dropped,
            Response::NeedsResync { .. } => Status::NeedsResync,
            Response::Error(_) => Status::Error,
        }
    }

    /// Map a server-side error onto the wire
    pub fn from_error(error: &ReplError) -> Self {
        match error {
            ReplError::NotLeader => Response::NotLeader,
            ReplError::GenerationSuperseded { submitted, current } => {
                Response::GenerationSuperseded {
                    submitted: *submitted,
                    current: *current,
                }
            }
            ReplError::Timeout(what) => Response::Timeout(what.clone()),
            ReplError::Dropped => Response::Dropped,
            ReplError::NeedsResync { applied } => Response::NeedsResync { applied: *applied },
            ReplError::OutOfOrder { expected, .. } => Response::NeedsResync {
                applied: expected.saturating_sub(1),
            },
            other => Response::Error(other.to_string()),
        }
    }

    /// Map a decoded response back onto the client-side result
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Response::Ok(reply) => Ok(reply),
            Response::NotFound => Err(ReplError::InvalidRequest("Not found".to_string())),
            Response::NotLeader => Err(ReplError::NotLeader),
            Response::GenerationSuperseded { submitted, current } => {
                Err(ReplError::GenerationSuperseded { submitted, current })
            }
            Response::Timeout(what) => Err(ReplError::Timeout(what)),
            Response::Dropped => Err(ReplError::Dropped),
            Response::NeedsResync { applied } => Err(ReplError::NeedsResync { applied }),
            Response::Error(message) => Err(ReplError::Remote(message)),
        }
    }
}
