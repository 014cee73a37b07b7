//! Poll loop driver.
//!
//! Runs the monitoring cycle on a fixed interval:
//!
//! ```text
//! IDLE → CONNECTING → POLLING → RENDERING → SLEEPING → CONNECTING …
//!                                               │
//!                                               └─ cancelled ─▶ STOPPED
//! ```
//!
//! A failing step ends its cycle early; the failure is logged and the loop
//! goes to sleep and tries again. Only cancellation stops the loop.

use std::collections::BTreeMap;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::MonitorSettings;
use crate::data::duration::format_duration;
use crate::data::{DashboardState, SeriesParser};
use crate::error::Result;
use crate::render::DashboardComposer;
use crate::signal::CancelSignal;
use crate::source::{Connector, LogReader, RemoteSession, SceneFetcher};

/// Where the driver is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Polling,
    Rendering,
    Sleeping,
    Stopped,
}

impl Phase {
    /// Returns the display label for this phase.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Polling => "polling",
            Phase::Rendering => "rendering",
            Phase::Sleeping => "sleeping",
            Phase::Stopped => "stopped",
        }
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Log bytes transferred.
    pub bytes_read: u64,
    /// Points appended or rewritten in the accumulator.
    pub new_samples: usize,
    pub skipped_lines: usize,
    pub dropped_cells: usize,
    pub scene_transfers: usize,
    /// Categories that could not be refreshed this cycle.
    pub scene_warnings: usize,
    pub rendered: bool,
}

/// Owns every component and the long-lived [`DashboardState`].
#[derive(Debug)]
pub struct App {
    settings: MonitorSettings,
    session: RemoteSession,
    reader: LogReader,
    /// One parser per log file, since parser state follows the file.
    parsers: BTreeMap<String, SeriesParser>,
    fetcher: SceneFetcher,
    composer: DashboardComposer,
    state: DashboardState,
    phase: Phase,
    cycle: u64,
    failed_cycles: u64,
    last_error: Option<String>,
}

impl App {
    /// Create a driver for one case.
    pub fn new(settings: MonitorSettings, connector: Box<dyn Connector>) -> Self {
        let fetcher = SceneFetcher::new(settings.scene_categories.clone(), settings.cache_dir.clone());
        let composer = DashboardComposer::new(settings.layout.clone());
        let state = DashboardState::new(settings.case_name.clone());
        Self {
            session: RemoteSession::new(connector),
            reader: LogReader::new(),
            parsers: BTreeMap::new(),
            fetcher,
            composer,
            state,
            phase: Phase::Idle,
            cycle: 0,
            failed_cycles: 0,
            last_error: None,
            settings,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Give up the accumulated state, e.g. after the loop stopped.
    pub fn into_state(self) -> DashboardState {
        self.state
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles
    }

    /// Error of the most recent failed cycle, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(case = %self.settings.case_name, cycle = self.cycle, from = self.phase.label(), to = phase.label(), "phase");
            self.phase = phase;
        }
    }

    /// Run one full cycle: connect, poll logs, merge, refresh scenes, render.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        self.set_phase(Phase::Connecting);
        self.session.ensure_connected()?;

        self.set_phase(Phase::Polling);
        for path in &self.settings.log_paths {
            let increment = self.reader.poll(&mut self.session, path)?;
            let parser = self
                .parsers
                .entry(path.clone())
                .or_insert_with(|| SeriesParser::new(self.settings.schema.clone()));
            if increment.truncated {
                parser.reset();
            }

            let outcome = parser.parse(&increment.text);
            let stats = self.state.series.record(&outcome.samples);

            report.bytes_read += increment.bytes_read;
            report.new_samples += stats.appended + stats.replaced;
            report.skipped_lines += outcome.skipped_lines;
            report.dropped_cells += outcome.dropped_cells;
            if outcome.skipped_lines > 0 || outcome.dropped_cells > 0 {
                debug!(
                    case = %self.settings.case_name,
                    cycle = self.cycle,
                    file = %path,
                    skipped_lines = outcome.skipped_lines,
                    dropped_cells = outcome.dropped_cells,
                    "malformed records skipped"
                );
            }
        }

        let refresh = self.fetcher.refresh(&mut self.session, &mut self.state.scenes);
        report.scene_transfers = refresh.transfers;
        report.scene_warnings = refresh.warnings.len();

        self.state.cycle = self.cycle;
        self.state.updated_at = Some(SystemTime::now());

        self.set_phase(Phase::Rendering);
        self.composer.render(&self.state, &self.settings.output_path)?;
        report.rendered = true;

        Ok(report)
    }

    /// Run one cycle and log its outcome. Never fails.
    pub fn run_once(&mut self) -> Option<CycleReport> {
        match self.run_cycle() {
            Ok(report) => {
                info!(
                    case = %self.settings.case_name,
                    cycle = report.cycle,
                    new_samples = report.new_samples,
                    bytes = report.bytes_read,
                    scenes = report.scene_transfers,
                    iteration = self.state.latest_iteration(),
                    "dashboard updated"
                );
                self.last_error = None;
                Some(report)
            }
            Err(err) => {
                self.failed_cycles += 1;
                warn!(
                    case = %self.settings.case_name,
                    cycle = self.cycle,
                    phase = self.phase.label(),
                    error = %err,
                    "cycle failed, retrying next interval"
                );
                self.last_error = Some(err.to_string());
                None
            }
        }
    }

    /// Cycle until `cancel` fires.
    ///
    /// Cancellation is observed at the sleep step; an in-flight cycle always
    /// completes first.
    pub fn run(&mut self, cancel: &CancelSignal) {
        info!(
            case = %self.settings.case_name,
            output = %self.settings.output_path.display(),
            interval = %format_duration(self.settings.interval),
            "monitoring started"
        );

        while !cancel.is_cancelled() {
            self.run_once();

            self.set_phase(Phase::Sleeping);
            if cancel.wait_timeout(self.settings.interval) {
                break;
            }
        }

        self.stop();
    }

    /// Close the connection and enter [`Phase::Stopped`].
    pub fn stop(&mut self) {
        self.session.disconnect();
        self.set_phase(Phase::Stopped);
        info!(
            case = %self.settings.case_name,
            cycles = self.cycle,
            failed = self.failed_cycles,
            "monitoring stopped"
        );
    }
}
