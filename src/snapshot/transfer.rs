//! Chunked snapshot transfer
//!
//! Large images are streamed as offset-addressed chunks. The receiver keeps
//! what it has and asks for `next_offset()` next.
//!
//! The server pins the image per connection. Offsets are only meaningful
//! while that connection lives; after a reconnect the transfer starts again
//! at offset 0.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};

use super::Snapshot;

/// One slice of an encoded snapshot image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotChunk {
    /// Index of the snapshot this chunk belongs to
    pub index: u64,
    pub generation: u64,

    /// Byte offset of `data` within the image
    pub offset: u64,

    /// Length of the whole image
    pub total_len: u64,

    pub data: Bytes,

    /// CRC32 of `data`
    pub crc: u32,
}

impl SnapshotChunk {
    /// Whether this chunk ends the image
    pub fn is_last(&self) -> bool {
        self.offset + self.data.len() as u64 >= self.total_len
    }
}

/// Serves chunks of one encoded snapshot
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    index: u64,
    generation: u64,
    image: Bytes,
    chunk_size: usize,
}

impl SnapshotSender {
    pub fn new(snapshot: &Snapshot, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ReplError::Config("Snapshot chunk size must be positive".to_string()));
        }
        Ok(Self {
            index: snapshot.index,
            generation: snapshot.generation,
            image: Bytes::from(snapshot.encode()?),
            chunk_size,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn total_len(&self) -> u64 {
        self.image.len() as u64
    }

    /// Chunk starting at `offset`, or `None` past the end
    pub fn chunk_at(&self, offset: u64) -> Option<SnapshotChunk> {
        let start = usize::try_from(offset).ok()?;
        if start >= self.image.len() {
            return None;
        }
        let end = (start + self.chunk_size).min(self.image.len());
        let data = self.image.slice(start..end);

        Some(SnapshotChunk {
            index: self.index,
            generation: self.generation,
            offset,
            total_len: self.total_len(),
            crc: crc32fast::hash(&data),
            data,
        })
    }

    /// All chunks from `offset` to the end
    pub fn chunks_from(&self, offset: u64) -> impl Iterator<Item = SnapshotChunk> + '_ {
        (offset..self.total_len())
            .step_by(self.chunk_size)
            .filter_map(move |o| self.chunk_at(o))
    }
}

/// Reassembles a snapshot from its chunks
#[derive(Debug, Default)]
pub struct SnapshotAssembler {
    /// (index, generation, total_len) fixed by the first chunk
    target: Option<(u64, u64, u64)>,
    buffer: BytesMut,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next chunk the assembler expects
    pub fn next_offset(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Index of the snapshot being assembled, once known
    pub fn index(&self) -> Option<u64> {
        self.target.map(|(index, _, _)| index)
    }

    /// Feed one chunk. Returns the snapshot once the image is complete.
    ///
    /// Chunks already received are ignored; chunks beyond the next offset
    /// are rejected.
    pub fn accept(&mut self, chunk: SnapshotChunk) -> Result<Option<Snapshot>> {
        let (index, generation, total_len) = *self
            .target
            .get_or_insert((chunk.index, chunk.generation, chunk.total_len));

        if chunk.index != index || chunk.generation != generation || chunk.total_len != total_len {
            return Err(ReplError::Protocol(format!(
                "Chunk for snapshot {} while assembling snapshot {}",
                chunk.index, index
            )));
        }
        if crc32fast::hash(&chunk.data) != chunk.crc {
            return Err(ReplError::SnapshotCorruption(format!(
                "Chunk CRC mismatch at offset {}",
                chunk.offset
            )));
        }

        let expected = self.next_offset();
        if chunk.offset < expected {
            tracing::trace!(offset = chunk.offset, expected, "Ignoring duplicate chunk");
            return Ok(None);
        }
        if chunk.offset > expected {
            return Err(ReplError::Protocol(format!(
                "Chunk gap: expected offset {}, got {}",
                expected, chunk.offset
            )));
        }

        self.buffer.extend_from_slice(&chunk.data);
        if self.next_offset() < total_len {
            return Ok(None);
        }

        let snapshot = Snapshot::decode(&self.buffer)?;
        if snapshot.index != index {
            return Err(ReplError::SnapshotCorruption(format!(
                "Image holds snapshot {}, chunks announced {}",
                snapshot.index, index
            )));
        }
        Ok(Some(snapshot))
    }
}
