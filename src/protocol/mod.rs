//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │   Payload (bincode Command) │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: WRITE          - batch + write options
//! - 0x02: MULTI_GET      - keys + read options
//! - 0x03: SNAPSHOT       - optional wait index
//! - 0x04: SNAPSHOT_CHUNK - pinned snapshot index + offset
//! - 0x05: STATUS
//! - 0x06: DROP
//! - 0x07: PING
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │  Payload (bincode Response) │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR
//! - 0x03: NOT_LEADER
//! - 0x04: GENERATION_SUPERSEDED
//! - 0x05: TIMEOUT
//!
//! The status byte must agree with the decoded response variant; a mismatch
//! is a protocol error rather than something to guess around.

mod codec;
mod command;
mod response;

pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::{Command, CommandType};
pub use response::{Reply, Response, Status};
