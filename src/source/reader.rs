//! Incremental log reader.
//!
//! Keeps one [`RemoteFileCursor`] per remote log and fetches only what was
//! appended since the previous poll. Trailing partial lines are held back
//! until their newline arrives, so the parser only ever sees whole records.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::RemoteSession;
use crate::error::{MonitorError, Result};

/// Read position within one remote file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFileCursor {
    pub path: String,
    /// Bytes consumed from the remote file so far.
    pub offset: u64,
    /// Bytes after the last newline, waiting for the rest of their line.
    pending: Vec<u8>,
    /// The file was truncated and the restart has not been handed out yet.
    restart_pending: bool,
}

impl RemoteFileCursor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            pending: Vec::new(),
            restart_pending: false,
        }
    }

    /// Number of buffered bytes not yet handed out.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether a truncation is still waiting to be reported.
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
        self.restart_pending = true;
    }

    /// Absorb new bytes and return every complete line now available.
    fn absorb(&mut self, bytes: Vec<u8>) -> String {
        self.pending.extend(bytes);
        match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
                String::from_utf8_lossy(&complete).into_owned()
            }
            None => String::new(),
        }
    }
}

/// Text produced by one poll of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogIncrement {
    /// Complete lines, each terminated by `\n`.
    pub text: String,
    /// Bytes transferred by this poll.
    pub bytes_read: u64,
    /// The file shrank and was re-read from the start.
    pub truncated: bool,
}

/// Tracks cursors for every monitored log file.
#[derive(Debug, Default)]
pub struct LogReader {
    cursors: BTreeMap<String, RemoteFileCursor>,
}

impl LogReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch whatever was appended to `path` since the last poll.
    pub fn poll(&mut self, session: &mut RemoteSession, path: &str) -> Result<LogIncrement> {
        let cursor = self
            .cursors
            .entry(path.to_string())
            .or_insert_with(|| RemoteFileCursor::new(path));

        let mut increment = session.read_file(path, cursor.offset)?;

        if increment.remote_len < cursor.offset {
            let err = MonitorError::TruncatedSource {
                path: path.to_string(),
                offset: cursor.offset,
                remote_len: increment.remote_len,
            };
            warn!(file = %path, error = %err, "log truncated");
            // Flag stays set until a read succeeds.
            cursor.reset();
            increment = session.read_file(path, 0)?;
        }

        let truncated = std::mem::take(&mut cursor.restart_pending);
        let bytes_read = increment.bytes.len() as u64;
        cursor.offset = increment.new_offset;
        let text = cursor.absorb(increment.bytes);

        debug!(
            file = %path,
            bytes = bytes_read,
            offset = cursor.offset,
            pending = cursor.pending.len(),
            "log polled"
        );

        Ok(LogIncrement {
            text,
            bytes_read,
            truncated,
        })
    }

    pub fn cursor(&self, path: &str) -> Option<&RemoteFileCursor> {
        self.cursors.get(path)
    }
}
