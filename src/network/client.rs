//! Blocking client
//!
//! One request in flight per connection. Server-side errors come back as
//! the matching `ReplError` variant.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;

use crate::coordinator::{ReadOptions, ReadResult, WriteOptions};
use crate::error::{ReplError, Result};
use crate::log::Mutation;
use crate::protocol::{read_response, write_command, Command, Reply, Response};
use crate::snapshot::{Snapshot, SnapshotAssembler, SnapshotSource};
use crate::status::StatusReport;

/// Restarts allowed when the server loses a pinned snapshot mid-transfer
const MAX_TRANSFER_RESTARTS: usize = 3;

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| ReplError::Network(format!("Failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Bound how long a single response may take
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send a command and decode the raw tagged response
    pub fn request(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    fn call(&mut self, command: &Command) -> Result<Reply> {
        self.request(command)?.into_result()
    }

    pub fn write(&mut self, batch: Vec<Mutation>, options: WriteOptions) -> Result<u64> {
        match self.call(&Command::Write { batch, options })? {
            Reply::Written { index } => Ok(index),
            other => Err(unexpected("Written", &other)),
        }
    }

    pub fn multi_get(&mut self, keys: Vec<String>, options: ReadOptions) -> Result<ReadResult> {
        match self.call(&Command::MultiGet { keys, options })? {
            Reply::Values(result) => Ok(result),
            other => Err(unexpected("Values", &other)),
        }
    }

    /// Whole snapshot in a single response
    pub fn snapshot(&mut self, wait_for_index: Option<u64>) -> Result<Snapshot> {
        match self.call(&Command::Snapshot { wait_for_index })? {
            Reply::Snapshot(snapshot) => Ok(snapshot),
            other => Err(unexpected("Snapshot", &other)),
        }
    }

    /// Snapshot streamed in chunks
    ///
    /// The pinned snapshot lives on this connection. If the server no longer
    /// holds it the transfer starts over with a fresh one. A lost connection
    /// surfaces as an error and the caller restarts from offset 0.
    pub fn snapshot_chunked(&mut self, wait_for_index: Option<u64>) -> Result<Snapshot> {
        for attempt in 0..=MAX_TRANSFER_RESTARTS {
            let mut assembler = SnapshotAssembler::new();
            loop {
                let command = Command::SnapshotChunk {
                    index: assembler.index(),
                    offset: assembler.next_offset(),
                    wait_for_index,
                };
                let chunk = match self.request(&command)? {
                    Response::Ok(Reply::Chunk(chunk)) => chunk,
                    Response::NotFound => {
                        tracing::debug!(attempt, "Pinned snapshot gone; restarting transfer");
                        break;
                    }
                    other => {
                        let reply = other.into_result()?;
                        return Err(unexpected("Chunk", &reply));
                    }
                };
                if let Some(snapshot) = assembler.accept(chunk)? {
                    return Ok(snapshot);
                }
            }
        }
        Err(ReplError::Network(format!(
            "Snapshot transfer restarted {} times",
            MAX_TRANSFER_RESTARTS
        )))
    }

    pub fn status(&mut self) -> Result<StatusReport> {
        match self.call(&Command::Status)? {
            Reply::Status(report) => Ok(report),
            other => Err(unexpected("Status", &other)),
        }
    }

    pub fn drop_instance(&mut self) -> Result<()> {
        match self.call(&Command::Drop)? {
            Reply::Dropped => Ok(()),
            other => Err(unexpected("Dropped", &other)),
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        match self.call(&Command::Ping)? {
            Reply::Pong => Ok(()),
            other => Err(unexpected("Pong", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &Reply) -> ReplError {
    ReplError::Protocol(format!("Expected {} reply, got {:?}", wanted, got))
}

/// A remote instance used as a snapshot source (chunked transfer)
pub struct RemoteSnapshotSource {
    client: Mutex<Client>,
}

impl RemoteSnapshotSource {
    pub fn connect(addr: &str) -> Result<Self> {
        Ok(Self {
            client: Mutex::new(Client::connect(addr)?),
        })
    }
}

impl SnapshotSource for RemoteSnapshotSource {
    fn fetch_snapshot(&self, min_index: u64) -> Result<Snapshot> {
        self.client.lock().snapshot_chunked(Some(min_index))
    }
}
