//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ReplError, Result};
use crate::protocol::{read_command, write_response, Command, Reply, Response};
use crate::replica::ReplicatedState;
use crate::snapshot::SnapshotSender;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// The instance this server fronts
    state: Arc<ReplicatedState>,

    /// Snapshot currently being streamed to this client in chunks
    transfer: Option<SnapshotSender>,

    chunk_size: usize,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, state: Arc<ReplicatedState>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let chunk_size = state.config().snapshot_chunk_size;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            state,
            transfer: None,
            chunk_size,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(ReplError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(ReplError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = write_response(&mut self.writer, &Response::Error(e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command.command_type());

            let response = self.execute_command(command);

            if let Err(e) = write_response(&mut self.writer, &response) {
                if let ReplError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a command and return a response
    fn execute_command(&mut self, command: Command) -> Response {
        let result = match command {
            Command::Write { batch, options } => self
                .state
                .write(batch, &options)
                .map(|index| Reply::Written { index }),
            Command::MultiGet { keys, options } => {
                self.state.multi_get(&keys, &options).map(Reply::Values)
            }
            Command::Snapshot { wait_for_index } => {
                self.state.get_snapshot(wait_for_index).map(Reply::Snapshot)
            }
            Command::SnapshotChunk {
                index,
                offset,
                wait_for_index,
            } => return self.snapshot_chunk(index, offset, wait_for_index),
            Command::Status => Ok(Reply::Status(self.state.status())),
            Command::Drop => self.state.drop_instance().map(|_| Reply::Dropped),
            Command::Ping => Ok(Reply::Pong),
        };

        match result {
            Ok(reply) => Response::Ok(reply),
            Err(e) => Response::from_error(&e),
        }
    }

    /// Serve one chunk, pinning the snapshot for the rest of the transfer
    fn snapshot_chunk(&mut self, index: Option<u64>, offset: u64, wait_for_index: Option<u64>) -> Response {
        if index.is_none() && offset == 0 {
            let sender = self
                .state
                .get_snapshot(wait_for_index)
                .and_then(|snapshot| SnapshotSender::new(&snapshot, self.chunk_size));
            match sender {
                Ok(sender) => self.transfer = Some(sender),
                Err(e) => return Response::from_error(&e),
            }
        }

        let Some(sender) = &self.transfer else {
            return Response::NotFound;
        };
        if index.is_some_and(|i| i != sender.index()) {
            return Response::NotFound;
        }

        match sender.chunk_at(offset) {
            Some(chunk) => Response::Ok(Reply::Chunk(chunk)),
            None => Response::Error(format!(
                "Offset {} beyond snapshot of {} bytes",
                offset,
                sender.total_len()
            )),
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
