//! Configuration for replikv
//!
//! Centralized, immutable per-instance configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a replicated state instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Instance Identity
    // -------------------------------------------------------------------------
    /// Database the instance belongs to
    pub database: String,

    /// Replicated state instance identifier (unique within the database)
    pub instance_id: String,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for persisted checkpoints. `None` keeps state in memory only.
    /// Internal structure:
    ///   {data_dir}/
    ///     └── snapshot.bin     (latest checkpoint)
    pub data_dir: Option<PathBuf>,

    /// Checkpoint after this many applied entries (0 disables)
    pub checkpoint_interval: u64,

    /// Chunk size used when streaming snapshots (in bytes)
    pub snapshot_chunk_size: usize,

    // -------------------------------------------------------------------------
    // Coordinator Timeouts
    // -------------------------------------------------------------------------
    /// Default bound on write milestone waits (milliseconds)
    pub write_timeout_ms: u64,

    /// Default bound on read floor waits (milliseconds)
    pub read_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 disables)
    pub socket_read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub socket_write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "_system".to_string(),
            instance_id: "s1".to_string(),
            data_dir: None,
            checkpoint_interval: 0,
            snapshot_chunk_size: 64 * 1024, // 64 KB
            write_timeout_ms: 5000,
            read_timeout_ms: 5000,
            listen_addr: "127.0.0.1:7420".to_string(),
            max_connections: 1024,
            socket_read_timeout_ms: 0,
            socket_write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default write wait bound
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Default read wait bound
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Path of the persisted checkpoint, if persistence is enabled
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("snapshot.bin"))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database name
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.config.database = name.into();
        self
    }

    /// Set the instance identifier
    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.config.instance_id = id.into();
        self
    }

    /// Enable checkpoint persistence under the given directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Checkpoint every `count` applied entries (0 disables)
    pub fn checkpoint_interval(mut self, count: u64) -> Self {
        self.config.checkpoint_interval = count;
        self
    }

    /// Set the snapshot chunk size (in bytes)
    pub fn snapshot_chunk_size(mut self, size: usize) -> Self {
        self.config.snapshot_chunk_size = size;
        self
    }

    /// Set the default write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the default read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the socket read timeout (in milliseconds)
    pub fn socket_read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_read_timeout_ms = ms;
        self
    }

    /// Set the socket write timeout (in milliseconds)
    pub fn socket_write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
