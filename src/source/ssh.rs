//! SSH/SFTP transport.
//!
//! Blocking libssh2 session with one SFTP channel. Log tails are read by
//! seeking the SFTP handle, so each cycle transfers only the appended bytes.

use std::io::{Read, Seek, SeekFrom};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use simwatch_types::ModMarker;
use tracing::debug;

use super::{Connector, DirEntry, RangeRead, RemoteFs};
use crate::error::TransportError;

/// libssh2 SFTP status for a missing file.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Default connect/read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// How to authenticate.
#[derive(Clone)]
pub enum SshAuth {
    Password(String),
    Key {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password(_) => f.write_str("Password(..)"),
            SshAuth::Key { path, .. } => f.debug_struct("Key").field("path", path).finish(),
        }
    }
}

/// Opens SFTP connections to one host.
#[derive(Debug, Clone)]
pub struct SshConnector {
    host: String,
    port: u16,
    user: String,
    auth: SshAuth,
    timeout: Duration,
    description: String,
}

impl SshConnector {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>, auth: SshAuth) -> Self {
        let host = host.into();
        let user = user.into();
        let description = format!("sftp://{}@{}:{}", user, host, port);
        Self {
            host,
            port,
            user,
            auth,
            timeout: DEFAULT_TIMEOUT,
            description,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Connector for SshConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, TransportError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect(format!("resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| TransportError::Connect(format!("no address for {}", self.host)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| TransportError::Connect(format!("{}: {}", addr, e)))?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.timeout.as_millis() as u32);
        session
            .handshake()
            .map_err(|e| TransportError::Connect(format!("handshake: {}", e)))?;

        let auth = match &self.auth {
            SshAuth::Password(password) => session.userauth_password(&self.user, password),
            SshAuth::Key { path, passphrase } => {
                session.userauth_pubkey_file(&self.user, None, path, passphrase.as_deref())
            }
        };
        auth.map_err(|e| TransportError::Auth(e.to_string()))?;
        if !session.authenticated() {
            return Err(TransportError::Auth(format!("{} rejected", self.user)));
        }

        let sftp = session.sftp()?;
        debug!(remote = %self.description, "sftp channel open");

        Ok(Box::new(SftpFs {
            sftp,
            _session: session,
            description: self.description.clone(),
        }))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// An open SFTP channel.
pub struct SftpFs {
    sftp: ssh2::Sftp,
    _session: ssh2::Session,
    description: String,
}

impl std::fmt::Debug for SftpFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpFs").field("description", &self.description).finish()
    }
}

fn sftp_error(path: &str, err: ssh2::Error) -> TransportError {
    match err.code() {
        ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => TransportError::NotFound(path.to_string()),
        _ => TransportError::Io(format!("{}: {}", path, err)),
    }
}

impl RemoteFs for SftpFs {
    fn read_range(&mut self, path: &str, offset: u64) -> Result<RangeRead, TransportError> {
        let remote = Path::new(path);
        let stat = self.sftp.stat(remote).map_err(|e| sftp_error(path, e))?;
        let remote_len = stat.size.unwrap_or(0);
        if remote_len <= offset {
            return Ok(RangeRead {
                bytes: Vec::new(),
                remote_len,
            });
        }

        let mut file = self.sftp.open(remote).map_err(|e| sftp_error(path, e))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::with_capacity((remote_len - offset) as usize);
        file.take(remote_len - offset).read_to_end(&mut bytes)?;
        Ok(RangeRead { bytes, remote_len })
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        let listing = self.sftp.readdir(Path::new(path)).map_err(|e| sftp_error(path, e))?;
        Ok(listing
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .filter_map(|(entry, stat)| {
                let name = entry.file_name()?.to_string_lossy().into_owned();
                Some(DirEntry {
                    name,
                    modified: ModMarker(stat.mtime.unwrap_or(0)),
                    size: stat.size.unwrap_or(0),
                })
            })
            .collect())
    }

    fn fetch(&mut self, path: &str) -> Result<Vec<u8>, TransportError> {
        let mut file = self.sftp.open(Path::new(path)).map_err(|e| sftp_error(path, e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
