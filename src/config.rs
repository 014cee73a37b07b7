//! Case configuration.
//!
//! A configuration file maps case names to [`CaseConfig`] records:
//!
//! ```json
//! {
//!   "Grid0": {
//!     "host": "10.1.1.218",
//!     "user": "cfd",
//!     "password": "",
//!     "base_dir": "/scratch/cfd",
//!     "simulation_folder": "Grid0",
//!     "case_subfolder": "05",
//!     "logfile": "run.log",
//!     "reports": ["Cd", "Cl", "Y+ maximo"]
//!   }
//! }
//! ```
//!
//! Values can be overridden from the environment with the `SIMWATCH` prefix
//! and `__` as separator, e.g. `SIMWATCH_GRID0__PASSWORD`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::data::LogSchema;
use crate::error::{MonitorError, Result};
use crate::render::{DashboardLayout, Theme};
use crate::source::{Connector, LocalConnector, SceneCategory};

pub const DEFAULT_RESIDUALS: &[&str] = &[
    "Continuity",
    "X-momentum",
    "Y-momentum",
    "Z-momentum",
    "Tke",
    "Sdr",
    "Intermittency",
];
pub const DEFAULT_KPIS: &[&str] = &["Y+ maximo"];
pub const DEFAULT_CATEGORIES: &[&str] = &["Pressure", "Velocity"];
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECENT_WINDOW: usize = 50;

/// Directory (under the output directory) holding downloaded scene images.
pub const CACHE_DIR_NAME: &str = ".simwatch-cache";

/// How the case directory is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Ssh,
    Local,
}

/// One entry of the configuration file.
///
/// Required keys are optional here so that validation can report every
/// missing key at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseConfig {
    #[serde(default)]
    pub transport: Transport,
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub key_passphrase: Option<String>,

    pub base_dir: Option<String>,
    pub simulation_folder: Option<String>,
    pub case_subfolder: Option<String>,
    pub logfile: Option<String>,

    #[serde(default)]
    pub reports: Vec<String>,
    #[serde(default = "default_kpis")]
    pub kpis: Vec<String>,
    #[serde(default = "default_residuals")]
    pub residuals: Vec<String>,
    #[serde(default = "default_categories")]
    pub image_categories: Vec<String>,
    pub report_y_limits: Option<[f64; 2]>,
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Poll interval such as `30s` or `2m`.
    pub interval: Option<String>,
    /// `dark` (default) or `light`.
    pub theme: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_kpis() -> Vec<String> {
    DEFAULT_KPIS.iter().map(|s| s.to_string()).collect()
}

fn default_residuals() -> Vec<String> {
    DEFAULT_RESIDUALS.iter().map(|s| s.to_string()).collect()
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()
}

fn default_recent_window() -> usize {
    DEFAULT_RECENT_WINDOW
}

/// Join path segments with `/`, the way remote POSIX paths are built.
///
/// Empty segments are skipped and duplicate separators collapsed.
pub fn posix_join(parts: &[&str]) -> String {
    let mut joined = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if part.starts_with('/') {
            joined = part.trim_end_matches('/').to_string();
            if joined.is_empty() {
                joined.push('/');
            }
            continue;
        }
        if !joined.is_empty() && !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(part.trim_end_matches('/'));
    }
    joined
}

/// Directory part of a POSIX path.
pub fn posix_dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Everything the poll loop needs, resolved from a [`CaseConfig`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub case_name: String,
    /// Remote paths of the monitored log files.
    pub log_paths: Vec<String>,
    pub schema: LogSchema,
    pub scene_categories: Vec<SceneCategory>,
    /// Where the dashboard image is written.
    pub output_path: PathBuf,
    /// Where downloaded scene images are kept.
    pub cache_dir: PathBuf,
    pub interval: Duration,
    pub layout: DashboardLayout,
}

impl CaseConfig {
    /// Check that all required keys are present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.transport == Transport::Ssh && non_empty(&self.user).is_none() {
            missing.push("user");
        }
        for (key, value) in [
            ("base_dir", &self.base_dir),
            ("simulation_folder", &self.simulation_folder),
            ("logfile", &self.logfile),
        ] {
            if non_empty(value).is_none() {
                missing.push(key);
            }
        }

        if !missing.is_empty() {
            return Err(MonitorError::Config(format!(
                "missing keys: {}",
                missing.join(", ")
            )));
        }
        if let Some([lo, hi]) = self.report_y_limits {
            if !(lo < hi) {
                return Err(MonitorError::Config(format!(
                    "report_y_limits must be increasing, got [{}, {}]",
                    lo, hi
                )));
            }
        }
        Ok(())
    }

    /// Remote path of the simulation log.
    pub fn log_path(&self) -> String {
        posix_join(&[
            self.base_dir.as_deref().unwrap_or_default(),
            self.simulation_folder.as_deref().unwrap_or_default(),
            self.logfile.as_deref().unwrap_or_default(),
        ])
    }

    /// Remote directory holding the per-category image folders.
    pub fn image_root(&self) -> String {
        let log_path = self.log_path();
        let log_dir = posix_dirname(&log_path);
        match non_empty(&self.case_subfolder) {
            Some(sub) => posix_join(&[log_dir, sub]),
            None => log_dir.to_string(),
        }
    }

    /// Poll interval, falling back to the default.
    pub fn interval(&self) -> Result<Duration> {
        match non_empty(&self.interval) {
            Some(raw) => parse_duration(raw).map_err(|e| MonitorError::Config(e.to_string())),
            None => Ok(DEFAULT_INTERVAL),
        }
    }

    fn theme(&self) -> Result<Theme> {
        match non_empty(&self.theme) {
            None | Some("dark") => Ok(Theme::dark()),
            Some("light") => Ok(Theme::light()),
            Some(other) => Err(MonitorError::Config(format!("unknown theme '{}'", other))),
        }
    }

    /// Resolve this entry into runtime settings.
    pub fn settings(&self, case_name: &str, output_dir: &Path) -> Result<MonitorSettings> {
        self.validate()?;

        let simulation_folder = self.simulation_folder.as_deref().unwrap_or_default();
        let output_path =
            output_dir.join(format!("status_{}_{}.png", simulation_folder, case_name));

        let image_root = self.image_root();
        let scene_categories = self
            .image_categories
            .iter()
            .map(|name| SceneCategory::new(name.clone(), posix_join(&[&image_root, name])))
            .collect();

        let schema = LogSchema::new(
            self.residuals.clone(),
            self.reports.clone(),
            self.kpis.clone(),
        );

        let layout = DashboardLayout {
            title: format!("{} / {}", simulation_folder, case_name),
            reports: self
                .reports
                .iter()
                .filter(|r| !self.kpis.contains(r))
                .cloned()
                .collect(),
            kpis: self.kpis.clone(),
            categories: self.image_categories.clone(),
            recent_window: self.recent_window.max(2),
            report_y_limits: self.report_y_limits.map(|[lo, hi]| (lo, hi)),
            theme: self.theme()?,
            ..DashboardLayout::default()
        };

        Ok(MonitorSettings {
            case_name: case_name.to_string(),
            log_paths: vec![self.log_path()],
            schema,
            scene_categories,
            output_path,
            cache_dir: output_dir.join(CACHE_DIR_NAME),
            interval: self.interval()?,
            layout,
        })
    }

    /// Build the transport connector for this case.
    pub fn connector(&self) -> Result<Box<dyn Connector>> {
        match self.transport {
            Transport::Local => Ok(Box::new(LocalConnector::new())),
            Transport::Ssh => self.ssh_connector(),
        }
    }

    #[cfg(feature = "ssh")]
    fn ssh_connector(&self) -> Result<Box<dyn Connector>> {
        use crate::source::{SshAuth, SshConnector};

        let host = non_empty(&self.host)
            .ok_or_else(|| MonitorError::Config("no host configured (use --host)".to_string()))?;
        let user = non_empty(&self.user)
            .ok_or_else(|| MonitorError::Config("missing keys: user".to_string()))?;

        // An empty or missing password selects key authentication.
        let auth = match non_empty(&self.password) {
            Some(password) => SshAuth::Password(password.to_string()),
            None => SshAuth::Key {
                path: expand_home(non_empty(&self.key_path).unwrap_or("~/.ssh/id_rsa")),
                passphrase: non_empty(&self.key_passphrase).map(str::to_string),
            },
        };
        Ok(Box::new(SshConnector::new(host, self.port, user, auth)))
    }

    #[cfg(not(feature = "ssh"))]
    fn ssh_connector(&self) -> Result<Box<dyn Connector>> {
        Err(MonitorError::Config(
            "built without the `ssh` feature; use transport = \"local\"".to_string(),
        ))
    }
}

/// Load every case from a configuration file plus `SIMWATCH_*` overrides.
pub fn load_cases(path: &Path) -> Result<BTreeMap<String, CaseConfig>> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix("SIMWATCH")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Look a case up by name, exactly first and then ignoring case.
pub fn find_case(cases: &BTreeMap<String, CaseConfig>, name: &str) -> Result<(String, CaseConfig)> {
    if let Some(case) = cases.get(name) {
        return Ok((name.to_string(), case.clone()));
    }
    if let Some((_, case)) = cases.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        // Keep the spelling from the command line for output file names.
        return Ok((name.to_string(), case.clone()));
    }

    let available: Vec<&str> = cases.keys().map(String::as_str).collect();
    Err(MonitorError::Config(format!(
        "case '{}' not found; available cases: {}",
        name,
        available.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn sample_case() -> CaseConfig {
        CaseConfig {
            host: Some("10.1.1.218".to_string()),
            port: 22,
            user: Some("cfd".to_string()),
            base_dir: Some("/scratch/cfd".to_string()),
            simulation_folder: Some("Grid0".to_string()),
            case_subfolder: Some("05".to_string()),
            logfile: Some("run.log".to_string()),
            reports: vec!["Cd".to_string(), "Y+ maximo".to_string()],
            kpis: default_kpis(),
            residuals: default_residuals(),
            image_categories: default_categories(),
            recent_window: DEFAULT_RECENT_WINDOW,
            ..CaseConfig::default()
        }
    }

    #[test]
    fn test_posix_join() {
        assert_eq!(posix_join(&["/scratch/", "Grid0", "run.log"]), "/scratch/Grid0/run.log");
        assert_eq!(posix_join(&["/a", "", "b/"]), "/a/b");
        assert_eq!(posix_join(&["rel", "x"]), "rel/x");
        assert_eq!(posix_join(&["/a", "/abs"]), "/abs");
    }

    #[test]
    fn test_posix_dirname() {
        assert_eq!(posix_dirname("/scratch/Grid0/run.log"), "/scratch/Grid0");
        assert_eq!(posix_dirname("/run.log"), "/");
        assert_eq!(posix_dirname("run.log"), "");
    }

    #[test]
    fn test_derived_paths() {
        let case = sample_case();
        assert_eq!(case.log_path(), "/scratch/cfd/Grid0/run.log");
        assert_eq!(case.image_root(), "/scratch/cfd/Grid0/05");

        let flat = CaseConfig {
            case_subfolder: None,
            ..sample_case()
        };
        assert_eq!(flat.image_root(), "/scratch/cfd/Grid0");
    }

    #[test]
    fn test_validate_lists_all_missing_keys() {
        let case = CaseConfig::default();
        let err = case.validate().unwrap_err().to_string();
        assert!(err.contains("user"));
        assert!(err.contains("base_dir"));
        assert!(err.contains("simulation_folder"));
        assert!(err.contains("logfile"));
    }

    #[test]
    fn test_local_transport_does_not_need_user() {
        let case = CaseConfig {
            transport: Transport::Local,
            user: None,
            ..sample_case()
        };
        assert!(case.validate().is_ok());
    }

    #[test]
    fn test_settings_resolution() {
        let case = sample_case();
        let settings = case.settings("case05", Path::new("/tmp/out")).unwrap();

        assert_eq!(settings.output_path, Path::new("/tmp/out/status_Grid0_case05.png"));
        assert_eq!(settings.cache_dir, Path::new("/tmp/out").join(CACHE_DIR_NAME));
        assert_eq!(settings.log_paths, vec!["/scratch/cfd/Grid0/run.log".to_string()]);
        assert_eq!(settings.scene_categories[0].remote_dir, "/scratch/cfd/Grid0/05/Pressure");
        assert_eq!(settings.interval, DEFAULT_INTERVAL);
        // KPIs are shown as text, not as report lines.
        assert_eq!(settings.layout.reports, vec!["Cd".to_string()]);
    }

    #[test]
    fn test_interval_parsing() {
        let case = CaseConfig {
            interval: Some("2m".to_string()),
            ..sample_case()
        };
        assert_eq!(case.interval().unwrap(), Duration::from_secs(120));

        let bad = CaseConfig {
            interval: Some("soon".to_string()),
            ..sample_case()
        };
        assert!(bad.interval().is_err());
    }

    #[test]
    fn test_bad_y_limits_rejected() {
        let case = CaseConfig {
            report_y_limits: Some([100.0, -100.0]),
            ..sample_case()
        };
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_load_and_find_case() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "Grid0": {{
                    "user": "cfd",
                    "password": "",
                    "base_dir": "/scratch/cfd",
                    "simulation_folder": "Grid0",
                    "logfile": "run.log",
                    "reports": ["Cd", "Y+ maximo"],
                    "report_y_limits": [-100.0, 100.0]
                }}
            }}"#
        )
        .unwrap();
        file.flush().unwrap();

        let cases = load_cases(file.path()).unwrap();
        let (name, case) = find_case(&cases, "Grid0").unwrap();
        assert_eq!(name, "Grid0");
        assert_eq!(case.port, 22);
        assert_eq!(case.reports, vec!["Cd".to_string(), "Y+ maximo".to_string()]);
        assert_eq!(case.kpis, default_kpis());
        assert_eq!(case.report_y_limits, Some([-100.0, 100.0]));

        let err = find_case(&cases, "Grid9").unwrap_err().to_string();
        assert!(err.contains("available cases"));
    }

    #[test]
    fn test_find_case_ignores_case() {
        let mut cases = BTreeMap::new();
        cases.insert("grid0".to_string(), sample_case());
        let (name, _) = find_case(&cases, "Grid0").unwrap();
        assert_eq!(name, "Grid0");
    }

    #[cfg(feature = "ssh")]
    #[test]
    fn test_ssh_connector_requires_host() {
        let case = CaseConfig {
            host: None,
            ..sample_case()
        };
        assert!(case.connector().is_err());
        assert!(sample_case().connector().is_ok());
    }

    #[test]
    fn test_expand_home() {
        std::env::set_var("HOME", "/home/cfd");
        assert_eq!(expand_home("~/.ssh/id_rsa"), PathBuf::from("/home/cfd/.ssh/id_rsa"));
        assert_eq!(expand_home("/etc/key"), PathBuf::from("/etc/key"));
    }
}
