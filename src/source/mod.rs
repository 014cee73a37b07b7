//! Remote access: transports, the session manager, and the two consumers
//! of a session (incremental log reading and scene fetching).
//!
//! The [`RemoteFs`] trait is the seam between the monitoring core and the
//! wire. Implementations exist for SSH/SFTP ([`SshConnector`], behind the
//! `ssh` feature), a locally mounted case directory ([`LocalConnector`]) and
//! an in-memory scripted remote ([`MemoryRemote`]) used by tests.

mod local;
mod memory;
mod reader;
mod scenes;
mod session;
#[cfg(feature = "ssh")]
mod ssh;

pub use local::{LocalConnector, LocalFs};
pub use memory::{MemoryConnector, MemoryFs, MemoryRemote};
pub use reader::{LogIncrement, LogReader, RemoteFileCursor};
pub use scenes::{latest_image, SceneCategory, SceneFetcher, SceneRefresh, IMAGE_EXTENSIONS};
pub(crate) use scenes::write_atomic;
pub use session::{Connection, FileIncrement, RemoteSession};
#[cfg(feature = "ssh")]
pub use ssh::{SftpFs, SshAuth, SshConnector};

use std::fmt::Debug;

use simwatch_types::ModMarker;

use crate::error::TransportError;

/// Bytes read from a remote file starting at some offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeRead {
    /// Content from the requested offset to the end of the file.
    /// Empty when the file is not longer than the offset.
    pub bytes: Vec<u8>,
    /// Size of the remote file at the time of the read.
    pub remote_len: u64,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub modified: ModMarker,
    pub size: u64,
}

/// File operations the monitor needs from a remote host.
///
/// Implementations must only transfer what was asked for: `read_range`
/// returns bytes beyond `offset` and never the whole file.
///
/// # Example
///
/// ```
/// use simwatch::source::{MemoryRemote, RemoteFs, Connector};
///
/// let remote = MemoryRemote::new();
/// remote.write_file("/case/run.log", b"hello\n", 1);
///
/// let mut fs = remote.connector().connect().unwrap();
/// let read = fs.read_range("/case/run.log", 2).unwrap();
/// assert_eq!(read.bytes, b"llo\n");
/// ```
pub trait RemoteFs: Send + Debug {
    /// Read everything after `offset`.
    fn read_range(&mut self, path: &str, offset: u64) -> Result<RangeRead, TransportError>;

    /// List regular files in a directory, in no particular order.
    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, TransportError>;

    /// Download a whole file.
    fn fetch(&mut self, path: &str) -> Result<Vec<u8>, TransportError>;

    /// Human-readable description, used in log output.
    fn description(&self) -> &str;
}

/// Opens [`RemoteFs`] connections. Held by the session manager so it can
/// reconnect with the configuration it was created with.
pub trait Connector: Send + Debug {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, TransportError>;

    fn description(&self) -> &str;
}
