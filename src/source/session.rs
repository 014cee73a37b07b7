//! Remote session manager.
//!
//! Owns the single connection to the remote host. A connection is opened
//! lazily by [`RemoteSession::ensure_connected`] and reused across cycles.
//! Any transport failure during an operation tears the connection down and
//! surfaces as [`MonitorError::RemoteUnavailable`]; the session never
//! retries on its own. The next call to `ensure_connected` makes exactly one
//! reconnect attempt.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::{Connector, DirEntry, RemoteFs};
use crate::error::{MonitorError, Result, TransportError};

/// An open connection and its bookkeeping.
#[derive(Debug)]
pub struct Connection {
    fs: Box<dyn RemoteFs>,
    alive: bool,
    opened_at: Instant,
    last_activity: Instant,
}

impl Connection {
    fn new(fs: Box<dyn RemoteFs>) -> Self {
        let now = Instant::now();
        Self {
            fs,
            alive: true,
            opened_at: now,
            last_activity: now,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn description(&self) -> &str {
        self.fs.description()
    }
}

/// Result of [`RemoteSession::read_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIncrement {
    /// Bytes beyond the requested offset.
    pub bytes: Vec<u8>,
    /// Offset just past the returned bytes.
    pub new_offset: u64,
    /// Size of the remote file when it was read.
    pub remote_len: u64,
}

/// Manages the lifetime of the connection to the remote host.
#[derive(Debug)]
pub struct RemoteSession {
    connector: Box<dyn Connector>,
    connection: Option<Connection>,
    connects: u64,
}

impl RemoteSession {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            connection: None,
            connects: 0,
        }
    }

    /// Make sure a live connection exists, opening one if needed.
    ///
    /// Makes at most one connection attempt per call.
    pub fn ensure_connected(&mut self) -> Result<&Connection> {
        if !self.is_connected() {
            self.connection = None;
            debug!(remote = %self.connector.description(), "connecting");

            let fs = self.connector.connect().map_err(|e| {
                MonitorError::remote(format!("connect {}", self.connector.description()), e)
            })?;
            self.connects += 1;
            if self.connects > 1 {
                info!(remote = %self.connector.description(), attempt = self.connects, "reconnected");
            } else {
                info!(remote = %self.connector.description(), "connected");
            }
            self.connection = Some(Connection::new(fs));
        }

        self.connection
            .as_ref()
            .ok_or_else(|| MonitorError::remote("connect", "no connection"))
    }

    /// Whether a live connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_alive)
    }

    /// Number of successful connects, including the first one.
    pub fn connect_count(&self) -> u64 {
        self.connects
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Close the connection, if any.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(remote = %self.connector.description(), "disconnected");
        }
    }

    /// Read the bytes of `path` beyond `offset`.
    pub fn read_file(&mut self, path: &str, offset: u64) -> Result<FileIncrement> {
        let read = self.with_connection(format!("read {}", path), |fs| fs.read_range(path, offset))?;
        let new_offset = offset + read.bytes.len() as u64;
        Ok(FileIncrement {
            bytes: read.bytes,
            new_offset,
            remote_len: read.remote_len,
        })
    }

    /// List regular files in a remote directory.
    pub fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        self.with_connection(format!("list {}", path), |fs| fs.list_dir(path))
    }

    /// Download a whole remote file.
    pub fn fetch_file(&mut self, path: &str) -> Result<Vec<u8>> {
        self.with_connection(format!("fetch {}", path), |fs| fs.fetch(path))
    }

    fn with_connection<T>(
        &mut self,
        context: String,
        op: impl FnOnce(&mut dyn RemoteFs) -> std::result::Result<T, TransportError>,
    ) -> Result<T> {
        let connection = match self.connection.as_mut() {
            Some(connection) if connection.alive => connection,
            _ => return Err(MonitorError::remote(context, "not connected")),
        };

        match op(connection.fs.as_mut()) {
            Ok(value) => {
                connection.last_activity = Instant::now();
                Ok(value)
            }
            // A missing file says nothing about the channel.
            Err(err @ TransportError::NotFound(_)) => {
                connection.last_activity = Instant::now();
                Err(MonitorError::remote(context, err))
            }
            Err(err) => {
                connection.alive = false;
                warn!(%context, error = %err, "transport failure, dropping connection");
                self.disconnect();
                Err(MonitorError::remote(context, err))
            }
        }
    }
}
