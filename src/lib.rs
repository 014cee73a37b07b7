//! # simwatch
//!
//! Remote monitor for long-running numerical simulations.
//!
//! This crate polls a simulation running on a remote host over SSH/SFTP,
//! reads only what was appended to its log since the last poll, parses the
//! residual and report tables out of it, fetches the latest scene images,
//! and renders everything into one status PNG that is refreshed in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           app (driver)                           │
//! │                                                                  │
//! │  ┌──────────────┐   ┌───────────┐   ┌─────────────┐              │
//! │  │ RemoteSession│──▶│ LogReader │──▶│ SeriesParser│──┐           │
//! │  │  (source)    │   └───────────┘   └─────────────┘  ▼           │
//! │  │              │                            ┌─────────────┐     │
//! │  │              │──▶ SceneFetcher ──────────▶│DashboardState│    │
//! │  └──────┬───────┘                            └──────┬──────┘     │
//! │         │                                           ▼            │
//! │         ▼                                  ┌─────────────────┐   │
//! │  SftpFs | LocalFs | MemoryFs               │DashboardComposer│──▶ status PNG
//! │                                            └─────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: the poll loop ([`App`]) with per-cycle failure isolation
//! - **[`source`]**: the [`RemoteFs`](source::RemoteFs) seam, transports, the
//!   session manager, incremental log reading and scene fetching
//! - **[`data`]**: table-driven log parsing, the accumulator, and the
//!   aggregate [`DashboardState`]
//! - **[`render`]**: the 2x2 dashboard image
//! - **[`config`]**: per-case configuration and derived paths
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Monitor case "Grid0" from config.json, writing status_<folder>_Grid0.png into ./out
//! simwatch Grid0 -o out
//!
//! # Poll every two minutes, one-off run for cron
//! simwatch Grid0 --interval 2m --once
//! ```
//!
//! ### As a library with an in-memory remote
//!
//! ```
//! use simwatch::config::{CaseConfig, Transport};
//! use simwatch::source::MemoryRemote;
//! use simwatch::App;
//!
//! let remote = MemoryRemote::new();
//! remote.write_file(
//!     "/scratch/Grid0/run.log",
//!     b"Iteration  Continuity\n1 1.0e-02\n2 5.0e-03\n",
//!     1,
//! );
//!
//! let case = CaseConfig {
//!     transport: Transport::Local,
//!     base_dir: Some("/scratch".into()),
//!     simulation_folder: Some("Grid0".into()),
//!     logfile: Some("run.log".into()),
//!     ..CaseConfig::default()
//! };
//! let out = tempfile::tempdir().unwrap();
//! let settings = case.settings("Grid0", out.path()).unwrap();
//!
//! let mut app = App::new(settings, Box::new(remote.connector()));
//! let report = app.run_cycle().unwrap();
//! assert_eq!(report.new_samples, 2);
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod render;
pub mod signal;
pub mod source;

use std::path::Path;

// Re-export main types for convenience
pub use app::{App, CycleReport, Phase};
pub use config::{CaseConfig, MonitorSettings};
pub use data::{Accumulator, DashboardState, LogSchema, SeriesParser};
pub use error::{MonitorError, Result, TransportError};
pub use render::{DashboardComposer, DashboardLayout};
pub use signal::CancelSignal;
pub use simwatch_types::{MergeStats, Point, Sample, SceneArtifact, Series, SeriesKey, SeriesKind};

/// Monitor one case until `cancel` fires and return the final state.
///
/// Only configuration problems are reported as errors; everything that goes
/// wrong while monitoring is logged and retried.
pub fn run(
    case: &CaseConfig,
    case_name: &str,
    output_dir: &Path,
    cancel: &CancelSignal,
) -> Result<DashboardState> {
    let settings = case.settings(case_name, output_dir)?;
    let connector = case.connector()?;
    let mut app = App::new(settings, connector);
    app.run(cancel);
    Ok(app.into_state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Transport;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn local_case(base: &Path) -> CaseConfig {
        CaseConfig {
            transport: Transport::Local,
            base_dir: Some(base.display().to_string()),
            simulation_folder: Some("Grid0".to_string()),
            logfile: Some("run.log".to_string()),
            residuals: vec!["Continuity".to_string()],
            interval: Some("1h".to_string()),
            ..CaseConfig::default()
        }
    }

    #[test]
    fn test_run_cancelled_before_start() {
        let base = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let state = run(&local_case(base.path()), "case05", out.path(), &cancel).unwrap();
        assert_eq!(state.cycle, 0);
        assert!(state.series.is_empty());
        assert!(!out.path().join("status_Grid0_case05.png").exists());
    }

    #[test]
    fn test_run_monitors_local_log_until_cancelled() {
        let base = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::create_dir(base.path().join("Grid0")).unwrap();
        std::fs::write(
            base.path().join("Grid0").join("run.log"),
            "Iteration  Continuity\n1 1.0e-02\n2 5.0e-03\n",
        )
        .unwrap();

        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let state = run(&local_case(base.path()), "case05", out.path(), &cancel).unwrap();
        canceller.join().unwrap();

        assert_eq!(state.cycle, 1);
        assert_eq!(
            state.series.get(&SeriesKey::residual("Continuity")).unwrap().len(),
            2
        );
        assert!(out.path().join("status_Grid0_case05.png").exists());
    }

    #[test]
    fn test_run_rejects_incomplete_config() {
        let out = TempDir::new().unwrap();
        let case = CaseConfig {
            transport: Transport::Local,
            ..CaseConfig::default()
        };
        let err = run(&case, "case05", out.path(), &CancelSignal::new()).unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }
}
