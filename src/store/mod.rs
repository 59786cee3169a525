//! Key-Value Store Module
//!
//! The local materialisation of the replicated state.
//!
//! ## Responsibilities
//! - Map string keys to opaque values
//! - Track the last applied log index and the writer generation
//! - Apply a whole batch, or replace the whole contents, as one step
//!
//! ## Data Structure Choice
//! BTreeMap so dumps come out in key order and two stores with the same
//! contents produce identical snapshots. The store itself is not
//! synchronised; the owning replica wraps it in a `parking_lot::RwLock`.

mod table;

pub use table::KeyValueStore;

/// Opaque value bytes
pub type Value = Vec<u8>;
