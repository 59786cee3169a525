//! Command definitions
//!
//! Represents requests from clients.

use serde::{Deserialize, Serialize};

use crate::coordinator::{ReadOptions, WriteOptions};
use crate::log::Mutation;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Write = 0x01,
    MultiGet = 0x02,
    Snapshot = 0x03,
    SnapshotChunk = 0x04,
    Status = 0x05,
    Drop = 0x06,
    Ping = 0x07,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Write),
            0x02 => Some(CommandType::MultiGet),
            0x03 => Some(CommandType::Snapshot),
            0x04 => Some(CommandType::SnapshotChunk),
            0x05 => Some(CommandType::Status),
            0x06 => Some(CommandType::Drop),
            0x07 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Submit a write batch
    Write {
        batch: Vec<Mutation>,
        options: WriteOptions,
    },

    /// Read several keys
    MultiGet {
        keys: Vec<String>,
        options: ReadOptions,
    },

    /// Whole snapshot in one response
    Snapshot { wait_for_index: Option<u64> },

    /// One chunk of a snapshot. `index: None` with offset 0 starts a new
    /// transfer; later chunks name the index the first chunk reported.
    SnapshotChunk {
        index: Option<u64>,
        offset: u64,
        wait_for_index: Option<u64>,
    },

    /// Status report
    Status,

    /// Discard the instance's state
    Drop,

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Write { .. } => CommandType::Write,
            Command::MultiGet { .. } => CommandType::MultiGet,
            Command::Snapshot { .. } => CommandType::Snapshot,
            Command::SnapshotChunk { .. } => CommandType::SnapshotChunk,
            Command::Status => CommandType::Status,
            Command::Drop => CommandType::Drop,
            Command::Ping => CommandType::Ping,
        }
    }
}
