//! Error types for the monitoring core.
//!
//! Every variant is recoverable from the poll loop's point of view: the
//! failing step is logged and the next cycle tries again. Only
//! [`MonitorError::Config`] stops the binary, and only at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the monitoring core.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Connection or transport failure. Retried next cycle.
    #[error("remote unavailable during {context}: {reason}")]
    RemoteUnavailable { context: String, reason: String },

    /// A remote file shrank below the consumed offset. The cursor is reset.
    #[error("{path} shrank from {offset} to {remote_len} bytes, re-reading from start")]
    TruncatedSource {
        path: String,
        offset: u64,
        remote_len: u64,
    },

    /// A line or cell that could not be parsed. Skipped.
    #[error("malformed record at line {line_no}: {reason}")]
    MalformedRecord { line_no: usize, reason: String },

    /// A scene image could not be listed or fetched. The cached copy is kept.
    #[error("scene '{category}' not refreshed: {reason}")]
    SceneFetchFailure { category: String, reason: String },

    /// The dashboard image could not be produced. The previous image stays.
    #[error("render failed: {0}")]
    RenderFailure(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MonitorError {
    pub fn remote(context: impl Into<String>, reason: impl ToString) -> Self {
        MonitorError::RemoteUnavailable {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MonitorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure came from the remote side.
    pub fn is_remote(&self) -> bool {
        matches!(self, MonitorError::RemoteUnavailable { .. })
    }
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        MonitorError::Config(err.to_string())
    }
}

/// Errors raised by a [`RemoteFs`](crate::source::RemoteFs) implementation.
///
/// The session manager converts all of these into
/// [`MonitorError::RemoteUnavailable`] after tearing the connection down.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach or authenticate with the host.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Authentication was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The remote path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other I/O failure on an established channel.
    #[error("transfer failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            TransportError::NotFound(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

#[cfg(feature = "ssh")]
impl From<ssh2::Error> for TransportError {
    fn from(err: ssh2::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
