//! Aggregate state rendered by the dashboard.

use std::collections::BTreeMap;
use std::time::SystemTime;

use simwatch_types::{SceneArtifact, SeriesKind};

use super::Accumulator;

/// Everything the monitor knows about the case at a point in time.
///
/// Owned by the poll loop and updated by merge every cycle; it is never
/// rebuilt from scratch while the process runs.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub case_name: String,
    /// Number of the cycle that last updated this state.
    pub cycle: u64,
    pub series: Accumulator,
    /// Latest scene image per category.
    pub scenes: BTreeMap<String, SceneArtifact>,
    /// When the last cycle finished merging.
    pub updated_at: Option<SystemTime>,
}

impl DashboardState {
    pub fn new(case_name: impl Into<String>) -> Self {
        Self {
            case_name: case_name.into(),
            ..Self::default()
        }
    }

    /// Highest iteration seen in any residual.
    pub fn latest_iteration(&self) -> Option<u64> {
        self.series
            .max_ordinate(SeriesKind::Residual)
            .map(|it| it as u64)
    }

    /// Highest physical time seen in any report or KPI.
    pub fn latest_time(&self) -> Option<f64> {
        [SeriesKind::Report, SeriesKind::Kpi]
            .into_iter()
            .filter_map(|kind| self.series.max_ordinate(kind))
            .max_by(f64::total_cmp)
    }

    /// Latest value of each named KPI, `None` until one was parsed.
    pub fn kpi_values<'a>(&self, names: &'a [String]) -> Vec<(&'a str, Option<f64>)> {
        names
            .iter()
            .map(|name| {
                let value = self.series.latest(SeriesKind::Kpi, name).map(|p| p.value);
                (name.as_str(), value)
            })
            .collect()
    }

    pub fn scene(&self, category: &str) -> Option<&SceneArtifact> {
        self.scenes.get(category)
    }

    /// Whether nothing has been parsed yet.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
