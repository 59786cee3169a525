//! Coordinator Module
//!
//! Client-facing write and read paths.
//!
//! Neither coordinator holds the store lock while waiting: both park on the
//! progress monitor and only touch the store to serve the final result.

mod read;
mod write;

pub use read::{ReadCoordinator, ReadOptions, ReadResult};
pub use write::{WriteCoordinator, WriteOptions};
