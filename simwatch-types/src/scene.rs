//! Scene artifacts - rendered images produced by the remote simulation.

use std::path::PathBuf;

/// Remote modification marker, in seconds since the Unix epoch.
///
/// Only compared for equality and ordering; the monitor never interprets
/// it as a wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ModMarker(pub u64);

impl From<u64> for ModMarker {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

/// The latest image fetched for one scene category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneArtifact {
    /// Category label, e.g. `Pressure`.
    pub category: String,
    /// File name inside the remote category directory.
    pub remote_name: String,
    /// Where the downloaded bytes live locally.
    pub local_path: PathBuf,
    pub modified: ModMarker,
}

impl SceneArtifact {
    /// Whether a remote listing entry refers to the same file version.
    pub fn is_same_version(&self, remote_name: &str, modified: ModMarker) -> bool {
        self.remote_name == remote_name && self.modified == modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> SceneArtifact {
        SceneArtifact {
            category: "Pressure".to_string(),
            remote_name: "pressure_0010.png".to_string(),
            local_path: PathBuf::from("/tmp/pressure.png"),
            modified: ModMarker(1_700_000_000),
        }
    }

    #[test]
    fn test_same_version_requires_name_and_marker() {
        let a = artifact();
        assert!(a.is_same_version("pressure_0010.png", ModMarker(1_700_000_000)));
        assert!(!a.is_same_version("pressure_0011.png", ModMarker(1_700_000_000)));
        assert!(!a.is_same_version("pressure_0010.png", ModMarker(1_700_000_060)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_marker_is_transparent() {
        assert_eq!(serde_json::to_string(&ModMarker(42)).unwrap(), "42");
    }
}
