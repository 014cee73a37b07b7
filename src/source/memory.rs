//! In-memory remote.
//!
//! A scripted stand-in for a remote host. The [`MemoryRemote`] handle is
//! shared between the test (which appends to files, drops connections and
//! reads transfer counters) and the [`MemoryFs`] connections handed to the
//! session manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use simwatch_types::ModMarker;

use super::{Connector, DirEntry, RangeRead, RemoteFs};
use crate::error::TransportError;

#[derive(Debug, Default)]
struct RemoteFile {
    bytes: Vec<u8>,
    modified: ModMarker,
}

#[derive(Debug, Default)]
struct RemoteState {
    files: BTreeMap<String, RemoteFile>,
    /// Bumped whenever connections are dropped; older handles stop working.
    generation: u64,
    offline: bool,
    failing_connects: usize,
    failing_rereads: usize,
    connects: usize,
    range_reads: usize,
    bytes_sent: u64,
    listings: usize,
    fetches: usize,
}

/// Shared handle to an in-memory remote filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that opens connections to this remote.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            remote: self.clone(),
            description: "memory://".to_string(),
        }
    }

    /// Create or replace a file.
    pub fn write_file(&self, path: &str, bytes: &[u8], modified: u64) {
        self.state.lock().files.insert(
            path.to_string(),
            RemoteFile {
                bytes: bytes.to_vec(),
                modified: ModMarker(modified),
            },
        );
    }

    /// Append to a file, creating it if needed.
    pub fn append(&self, path: &str, bytes: &[u8]) {
        let mut state = self.state.lock();
        let file = state.files.entry(path.to_string()).or_default();
        file.bytes.extend_from_slice(bytes);
    }

    pub fn remove_file(&self, path: &str) {
        self.state.lock().files.remove(path);
    }

    /// Break every open connection. They fail until the session reconnects.
    pub fn drop_connections(&self) {
        self.state.lock().generation += 1;
    }

    /// While offline every connect and every operation fails.
    pub fn set_offline(&self, offline: bool) {
        let mut state = self.state.lock();
        state.offline = offline;
        if offline {
            state.generation += 1;
        }
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().failing_connects = n;
    }

    /// Drop the link on the next `n` reads that start at offset 0.
    pub fn fail_next_rereads(&self, n: usize) {
        self.state.lock().failing_rereads = n;
    }

    /// Successful connections opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Range reads served so far.
    pub fn range_read_count(&self) -> usize {
        self.state.lock().range_reads
    }

    /// Total bytes returned by range reads.
    pub fn bytes_sent(&self) -> u64 {
        self.state.lock().bytes_sent
    }

    /// Directory listings served so far.
    pub fn listing_count(&self) -> usize {
        self.state.lock().listings
    }

    /// Whole-file transfers served so far.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }
}

/// Connector for a [`MemoryRemote`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    remote: MemoryRemote,
    description: String,
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, TransportError> {
        let mut state = self.remote.state.lock();
        if state.offline {
            return Err(TransportError::Connect("host unreachable".to_string()));
        }
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        state.connects += 1;
        Ok(Box::new(MemoryFs {
            remote: self.remote.clone(),
            generation: state.generation,
            description: self.description.clone(),
        }))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// One open connection to a [`MemoryRemote`].
#[derive(Debug)]
pub struct MemoryFs {
    remote: MemoryRemote,
    generation: u64,
    description: String,
}

impl MemoryFs {
    fn check_alive(&self, state: &RemoteState) -> Result<(), TransportError> {
        if state.offline || state.generation != self.generation {
            return Err(TransportError::Io("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

impl RemoteFs for MemoryFs {
    fn read_range(&mut self, path: &str, offset: u64) -> Result<RangeRead, TransportError> {
        let mut state = self.remote.state.lock();
        self.check_alive(&state)?;
        if offset == 0 && state.failing_rereads > 0 {
            state.failing_rereads -= 1;
            state.generation += 1;
            return Err(TransportError::Io("connection reset by peer".to_string()));
        }

        let file = state
            .files
            .get(path)
            .ok_or_else(|| TransportError::NotFound(path.to_string()))?;
        let remote_len = file.bytes.len() as u64;
        let bytes = if offset < remote_len {
            file.bytes[offset as usize..].to_vec()
        } else {
            Vec::new()
        };

        state.range_reads += 1;
        state.bytes_sent += bytes.len() as u64;
        Ok(RangeRead { bytes, remote_len })
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        let mut state = self.remote.state.lock();
        self.check_alive(&state)?;

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let entries: Vec<DirEntry> = state
            .files
            .iter()
            .filter_map(|(full, file)| {
                let name = full.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                Some(DirEntry {
                    name: name.to_string(),
                    modified: file.modified,
                    size: file.bytes.len() as u64,
                })
            })
            .collect();

        state.listings += 1;
        Ok(entries)
    }

    fn fetch(&mut self, path: &str) -> Result<Vec<u8>, TransportError> {
        let mut state = self.remote.state.lock();
        self.check_alive(&state)?;

        let bytes = state
            .files
            .get(path)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| TransportError::NotFound(path.to_string()))?;
        state.fetches += 1;
        Ok(bytes)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
