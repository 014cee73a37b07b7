//! Local filesystem transport.
//!
//! Serves the same contract as the SSH transport for a case directory that
//! is reachable through a local mount (NFS, SMB, or a run on this machine).

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::time::UNIX_EPOCH;

use simwatch_types::ModMarker;

use super::{Connector, DirEntry, RangeRead, RemoteFs};
use crate::error::TransportError;

/// Connector for [`LocalFs`]. Connecting never fails.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector;

impl LocalConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for LocalConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, TransportError> {
        Ok(Box::new(LocalFs::new()))
    }

    fn description(&self) -> &str {
        "local filesystem"
    }
}

/// A [`RemoteFs`] backed by `std::fs`.
#[derive(Debug, Default)]
pub struct LocalFs {
    description: String,
}

impl LocalFs {
    pub fn new() -> Self {
        Self {
            description: "file://".to_string(),
        }
    }
}

fn modified_marker(meta: &fs::Metadata) -> ModMarker {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| ModMarker(d.as_secs()))
        .unwrap_or_default()
}

impl RemoteFs for LocalFs {
    fn read_range(&mut self, path: &str, offset: u64) -> Result<RangeRead, TransportError> {
        let mut file = File::open(path)?;
        let remote_len = file.metadata()?.len();
        if remote_len <= offset {
            return Ok(RangeRead {
                bytes: Vec::new(),
                remote_len,
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::with_capacity((remote_len - offset) as usize);
        // Bounded by the size we just observed so the offset never runs
        // past what the caller was told the file length is.
        file.take(remote_len - offset).read_to_end(&mut bytes)?;
        Ok(RangeRead { bytes, remote_len })
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified: modified_marker(&meta),
                size: meta.len(),
            });
        }
        Ok(entries)
    }

    fn fetch(&mut self, path: &str) -> Result<Vec<u8>, TransportError> {
        Ok(fs::read(path)?)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
