//! Snapshot Module
//!
//! Point-in-time images of the store, used to bootstrap new replicas and to
//! fast-forward replicas whose log was compacted past what they need.
//!
//! ## Image Format
//! ```text
//! ┌──────────┬─────────────┬─────────┬─────────┬──────────────────┐
//! │Magic (4) │ Version (2) │ CRC (4) │ Len (8) │ bincode(Snapshot)│
//! └──────────┴─────────────┴─────────┴─────────┴──────────────────┘
//! ```
//! The same image is written to `{data_dir}/snapshot.bin` and cut into
//! chunks for transfer.

mod manager;
mod transfer;

pub use manager::{SnapshotManager, SnapshotReport, SnapshotStatus};
pub use transfer::{SnapshotAssembler, SnapshotChunk, SnapshotSender};

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};
use crate::store::Value;

/// Magic bytes at the start of every image
pub const MAGIC: &[u8; 4] = b"RKVS";

/// Current image format version
pub const FORMAT_VERSION: u16 = 1;

/// Magic (4) + version (2) + crc (4) + body length (8)
pub const HEADER_SIZE: usize = 18;

/// A consistent dump of the store at `index`
///
/// Immutable once produced. A snapshot at N stands in for having applied
/// entries 1..N.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub index: u64,
    pub generation: u64,
    /// Key-sorted contents
    pub entries: Vec<(String, Value)>,
}

impl Snapshot {
    pub fn new(index: u64, generation: u64, entries: Vec<(String, Value)>) -> Self {
        Self {
            index,
            generation,
            entries,
        }
    }

    /// Look up a key (binary search over the sorted entries)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|pos| &self.entries[pos].1)
    }

    /// Encode into a checksummed image
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let crc = crc32fast::hash(&body);

        let mut image = Vec::with_capacity(HEADER_SIZE + body.len());
        image.extend_from_slice(MAGIC);
        image.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        image.extend_from_slice(&crc.to_be_bytes());
        image.extend_from_slice(&(body.len() as u64).to_be_bytes());
        image.extend_from_slice(&body);
        Ok(image)
    }

    /// Decode and verify an image
    pub fn decode(image: &[u8]) -> Result<Self> {
        if image.len() < HEADER_SIZE {
            return Err(ReplError::SnapshotCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                image.len()
            )));
        }
        if &image[0..4] != MAGIC {
            return Err(ReplError::SnapshotCorruption("Bad magic".to_string()));
        }

        let version = u16::from_be_bytes([image[4], image[5]]);
        if version != FORMAT_VERSION {
            return Err(ReplError::SnapshotCorruption(format!(
                "Unsupported format version {}",
                version
            )));
        }

        let crc = u32::from_be_bytes([image[6], image[7], image[8], image[9]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&image[10..18]);
        let body_len = u64::from_be_bytes(len_bytes) as usize;

        let body = &image[HEADER_SIZE..];
        if body.len() != body_len {
            return Err(ReplError::SnapshotCorruption(format!(
                "Body length mismatch: header says {}, found {}",
                body_len,
                body.len()
            )));
        }
        if crc32fast::hash(body) != crc {
            return Err(ReplError::SnapshotCorruption("CRC mismatch".to_string()));
        }

        Ok(bincode::deserialize(body)?)
    }

    /// Write the image atomically (temp file, fsync, rename)
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&self.encode()?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read an image written by `write_to`
    pub fn read_from(path: &Path) -> Result<Self> {
        let image = fs::read(path)?;
        Self::decode(&image)
    }
}

/// Somewhere a snapshot can be fetched from (a leader, a peer, a file)
pub trait SnapshotSource: Send + Sync {
    /// Fetch a snapshot whose index is at least `min_index`
    fn fetch_snapshot(&self, min_index: u64) -> Result<Snapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot::new(
            7,
            2,
            vec![
                ("a".to_string(), b"1".to_vec()),
                ("b".to_string(), b"2".to_vec()),
            ],
        )
    }

    #[test]
    fn test_decode_detects_flipped_byte() {
        let mut image = sample().encode().unwrap();
        let last = image.len() - 1;
        image[last] ^= 0xff;

        let result = Snapshot::decode(&image);
        assert!(matches!(result, Err(ReplError::SnapshotCorruption(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_image() {
        let image = sample().encode().unwrap();
        let result = Snapshot::decode(&image[..image.len() - 3]);
        assert!(matches!(result, Err(ReplError::SnapshotCorruption(_))));
    }

    #[test]
    fn test_get_uses_sorted_entries() {
        let snapshot = sample();
        assert_eq!(snapshot.get("b"), Some(&b"2".to_vec()));
        assert_eq!(snapshot.get("c"), None);
    }
}
