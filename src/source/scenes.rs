//! Scene fetcher.
//!
//! For every configured image category, finds the most recently modified
//! image in its remote directory and downloads it only when it differs from
//! the cached copy. A failed refresh keeps the previous artifact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use simwatch_types::SceneArtifact;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{DirEntry, RemoteSession};
use crate::config::posix_join;
use crate::error::{MonitorError, Result};

/// File extensions treated as scene images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

/// One image category and the remote directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneCategory {
    pub name: String,
    pub remote_dir: String,
}

impl SceneCategory {
    pub fn new(name: impl Into<String>, remote_dir: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_dir: remote_dir.into(),
        }
    }
}

/// Outcome of one [`SceneFetcher::refresh`].
#[derive(Debug, Default)]
pub struct SceneRefresh {
    /// Images downloaded this cycle.
    pub transfers: usize,
    /// Categories whose cached artifact was reused.
    pub cache_hits: usize,
    /// Per-category failures; the rest of the cycle carries on.
    pub warnings: Vec<MonitorError>,
}

fn image_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// The most recently modified image in a listing.
///
/// Listing order is ignored; ties on the modification marker go to the
/// lexically greatest name.
pub fn latest_image(entries: &[DirEntry]) -> Option<&DirEntry> {
    entries
        .iter()
        .filter(|e| image_extension(&e.name).is_some())
        .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)))
}

/// Keeps the latest scene image of each category available locally.
#[derive(Debug, Clone)]
pub struct SceneFetcher {
    categories: Vec<SceneCategory>,
    cache_dir: PathBuf,
}

impl SceneFetcher {
    pub fn new(categories: Vec<SceneCategory>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            categories,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn categories(&self) -> &[SceneCategory] {
        &self.categories
    }

    /// Refresh every category in `scenes`.
    pub fn refresh(
        &self,
        session: &mut RemoteSession,
        scenes: &mut BTreeMap<String, SceneArtifact>,
    ) -> SceneRefresh {
        let mut outcome = SceneRefresh::default();

        for category in &self.categories {
            let cached = scenes.get(&category.name);
            match self.refresh_category(session, category, cached) {
                Ok(Refreshed::Downloaded(artifact)) => {
                    outcome.transfers += 1;
                    scenes.insert(category.name.clone(), artifact);
                }
                Ok(Refreshed::Unchanged) => outcome.cache_hits += 1,
                Ok(Refreshed::Empty) => {
                    debug!(category = %category.name, dir = %category.remote_dir, "no scene images yet");
                }
                Err(reason) => {
                    let err = MonitorError::SceneFetchFailure {
                        category: category.name.clone(),
                        reason: reason.to_string(),
                    };
                    warn!(category = %category.name, error = %err, "keeping cached scene");
                    outcome.warnings.push(err);
                }
            }
        }

        outcome
    }

    fn refresh_category(
        &self,
        session: &mut RemoteSession,
        category: &SceneCategory,
        cached: Option<&SceneArtifact>,
    ) -> Result<Refreshed> {
        let entries = session.list_dir(&category.remote_dir)?;
        let Some(latest) = latest_image(&entries) else {
            return Ok(Refreshed::Empty);
        };

        if cached.is_some_and(|c| c.is_same_version(&latest.name, latest.modified)) {
            return Ok(Refreshed::Unchanged);
        }

        let remote_path = posix_join(&[&category.remote_dir, &latest.name]);
        let bytes = session.fetch_file(&remote_path)?;
        let ext = image_extension(&latest.name).unwrap_or_else(|| "png".to_string());
        let local_path = self.cache_dir.join(format!("{}.{}", category.name, ext));
        write_atomic(&local_path, &bytes)?;
        if let Some(previous) = cached.filter(|c| c.local_path != local_path) {
            remove_stale(&previous.local_path);
        }

        debug!(category = %category.name, file = %latest.name, bytes = bytes.len(), "scene downloaded");
        Ok(Refreshed::Downloaded(SceneArtifact {
            category: category.name.clone(),
            remote_name: latest.name.clone(),
            local_path,
            modified: latest.modified,
        }))
    }
}

enum Refreshed {
    Downloaded(SceneArtifact),
    Unchanged,
    Empty,
}

fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(file = %path.display(), "stale scene removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "cannot remove stale scene"),
    }
}

/// Write `bytes` to `path` so readers never see a partial file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| MonitorError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MonitorError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| MonitorError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| MonitorError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRemote;
    use simwatch_types::ModMarker;
    use tempfile::TempDir;

    fn entry(name: &str, modified: u64) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            modified: ModMarker(modified),
            size: 1,
        }
    }

    fn setup() -> (MemoryRemote, RemoteSession, TempDir, SceneFetcher) {
        let remote = MemoryRemote::new();
        let mut session = RemoteSession::new(Box::new(remote.connector()));
        session.ensure_connected().unwrap();
        let cache = TempDir::new().unwrap();
        let fetcher = SceneFetcher::new(
            vec![
                SceneCategory::new("Pressure", "/case/img/Pressure"),
                SceneCategory::new("Velocity", "/case/img/Velocity"),
            ],
            cache.path(),
        );
        (remote, session, cache, fetcher)
    }

    #[test]
    fn test_latest_image_uses_mtime_not_order() {
        let entries = vec![
            entry("scene_0003.png", 100),
            entry("scene_0010.png", 300),
            entry("scene_0005.png", 200),
            entry("notes.txt", 900),
        ];
        assert_eq!(latest_image(&entries).unwrap().name, "scene_0010.png");
    }

    #[test]
    fn test_latest_image_extension_case_insensitive() {
        let entries = vec![entry("a.PNG", 5), entry("b.Jpeg", 7), entry("c.vtk", 9)];
        assert_eq!(latest_image(&entries).unwrap().name, "b.Jpeg");
        assert!(latest_image(&[entry("run.log", 1)]).is_none());
    }

    #[test]
    fn test_refresh_downloads_latest() {
        let (remote, mut session, cache, fetcher) = setup();
        remote.write_file("/case/img/Pressure/p_001.png", b"old", 10);
        remote.write_file("/case/img/Pressure/p_002.png", b"new", 20);
        let mut scenes = BTreeMap::new();

        let outcome = fetcher.refresh(&mut session, &mut scenes);

        assert_eq!(outcome.transfers, 1);
        let pressure = &scenes["Pressure"];
        assert_eq!(pressure.remote_name, "p_002.png");
        assert_eq!(pressure.local_path, cache.path().join("Pressure.png"));
        assert_eq!(fs::read(&pressure.local_path).unwrap(), b"new");
        assert!(!scenes.contains_key("Velocity"));
    }

    #[test]
    fn test_unchanged_scene_is_not_transferred_again() {
        let (remote, mut session, _cache, fetcher) = setup();
        remote.write_file("/case/img/Pressure/p_001.png", b"img", 10);
        let mut scenes = BTreeMap::new();

        fetcher.refresh(&mut session, &mut scenes);
        assert_eq!(remote.fetch_count(), 1);

        let second = fetcher.refresh(&mut session, &mut scenes);
        assert_eq!(remote.fetch_count(), 1);
        assert_eq!(second.transfers, 0);
        assert_eq!(second.cache_hits, 1);
    }

    #[test]
    fn test_rewritten_scene_with_new_mtime_is_fetched() {
        let (remote, mut session, _cache, fetcher) = setup();
        remote.write_file("/case/img/Pressure/p.png", b"v1", 10);
        let mut scenes = BTreeMap::new();
        fetcher.refresh(&mut session, &mut scenes);

        remote.write_file("/case/img/Pressure/p.png", b"v2", 11);
        fetcher.refresh(&mut session, &mut scenes);

        assert_eq!(remote.fetch_count(), 2);
        assert_eq!(scenes["Pressure"].modified, ModMarker(11));
        assert_eq!(fs::read(&scenes["Pressure"].local_path).unwrap(), b"v2");
    }

    #[test]
    fn test_failed_fetch_keeps_cached_artifact() {
        let (remote, mut session, _cache, fetcher) = setup();
        remote.write_file("/case/img/Pressure/p_001.png", b"img", 10);
        let mut scenes = BTreeMap::new();
        fetcher.refresh(&mut session, &mut scenes);
        let before = scenes["Pressure"].clone();

        remote.write_file("/case/img/Pressure/p_002.png", b"img2", 20);
        remote.drop_connections();
        let outcome = fetcher.refresh(&mut session, &mut scenes);

        assert_eq!(outcome.transfers, 0);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(matches!(
            outcome.warnings[0],
            MonitorError::SceneFetchFailure { .. }
        ));
        assert_eq!(scenes["Pressure"], before);
    }

    #[test]
    fn test_categories_differing_in_case_get_separate_files() {
        let (remote, mut session, cache, _) = setup();
        let fetcher = SceneFetcher::new(
            vec![
                SceneCategory::new("Pressure", "/case/img/Pressure"),
                SceneCategory::new("pressure", "/case/img/pressure"),
            ],
            cache.path(),
        );
        remote.write_file("/case/img/Pressure/a.png", b"upper", 10);
        remote.write_file("/case/img/pressure/b.png", b"lower", 10);
        let mut scenes = BTreeMap::new();

        fetcher.refresh(&mut session, &mut scenes);

        assert_ne!(scenes["Pressure"].local_path, scenes["pressure"].local_path);
        assert_eq!(fs::read(&scenes["Pressure"].local_path).unwrap(), b"upper");
        assert_eq!(fs::read(&scenes["pressure"].local_path).unwrap(), b"lower");
    }

    #[test]
    fn test_extension_change_removes_previous_file() {
        let (remote, mut session, cache, fetcher) = setup();
        remote.write_file("/case/img/Pressure/p_001.png", b"png", 10);
        let mut scenes = BTreeMap::new();
        fetcher.refresh(&mut session, &mut scenes);
        let old_path = scenes["Pressure"].local_path.clone();

        remote.write_file("/case/img/Pressure/p_002.jpg", b"jpg", 20);
        fetcher.refresh(&mut session, &mut scenes);

        assert_eq!(scenes["Pressure"].local_path, cache.path().join("Pressure.jpg"));
        assert_eq!(fs::read(&scenes["Pressure"].local_path).unwrap(), b"jpg");
        assert!(!old_path.exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.bin");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }
}
