//! Long-lived series storage.

use std::collections::BTreeMap;

use simwatch_types::{MergeStats, Point, Sample, Series, SeriesKey, SeriesKind};

/// Every series seen during the run, keyed by family and name.
///
/// Nothing is ever evicted; a full case run is expected to fit in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    series: BTreeMap<SeriesKey, Series>,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold parsed samples into their series, in the order given.
    pub fn record(&mut self, samples: &[Sample]) -> MergeStats {
        let mut stats = MergeStats::default();
        for sample in samples {
            stats.absorb(self.merge(&sample.key, [sample.point()]));
        }
        stats
    }

    /// Merge points into one series, creating it on first use.
    pub fn merge<I>(&mut self, key: &SeriesKey, points: I) -> MergeStats
    where
        I: IntoIterator<Item = Point>,
    {
        if let Some(series) = self.series.get_mut(key) {
            return series.merge(points);
        }
        let mut series = Series::new(key.clone());
        let stats = series.merge(points);
        self.series.insert(key.clone(), series);
        stats
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&Series> {
        self.series.get(key)
    }

    /// All series of one family, ordered by name.
    pub fn of_kind(&self, kind: SeriesKind) -> impl Iterator<Item = &Series> + '_ {
        self.series.values().filter(move |s| s.key.kind == kind)
    }

    /// Most recent point of a named series.
    pub fn latest(&self, kind: SeriesKind, name: &str) -> Option<Point> {
        self.series
            .get(&SeriesKey::new(kind, name))
            .and_then(Series::latest)
    }

    /// The last `n` points of a series, empty if it does not exist.
    pub fn recent(&self, key: &SeriesKey, n: usize) -> &[Point] {
        self.series.get(key).map(|s| s.last_n(n)).unwrap_or(&[])
    }

    /// Largest ordinate across a family.
    pub fn max_ordinate(&self, kind: SeriesKind) -> Option<f64> {
        self.of_kind(kind)
            .filter_map(Series::max_ordinate)
            .max_by(f64::total_cmp)
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of points across all series.
    pub fn total_points(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(name: &str, iteration: f64, value: f64) -> Sample {
        Sample::new(SeriesKey::residual(name), iteration, value)
    }

    #[test]
    fn test_record_creates_series() {
        let mut acc = Accumulator::new();
        let stats = acc.record(&[
            residual("Continuity", 1.0, 0.1),
            residual("Tke", 1.0, 0.3),
            residual("Continuity", 2.0, 0.05),
        ]);

        assert_eq!(stats.appended, 3);
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get(&SeriesKey::residual("Continuity")).unwrap().len(), 2);
    }

    #[test]
    fn test_replayed_batch_is_idempotent() {
        let batch: Vec<Sample> = (1..=20)
            .map(|i| residual("Continuity", i as f64, 1.0 / i as f64))
            .collect();

        let mut once = Accumulator::new();
        once.record(&batch);

        let mut twice = Accumulator::new();
        twice.record(&batch);
        let stats = twice.record(&batch);

        assert_eq!(once, twice);
        assert!(!stats.changed());
        assert_eq!(stats.dropped, 20);
    }

    #[test]
    fn test_overlapping_window_appends_only_new() {
        let mut acc = Accumulator::new();
        acc.record(&[residual("Sdr", 1.0, 0.1), residual("Sdr", 2.0, 0.2)]);
        let stats = acc.record(&[
            residual("Sdr", 2.0, 0.2),
            residual("Sdr", 3.0, 0.3),
        ]);

        assert_eq!(stats.appended, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(acc.total_points(), 3);
    }

    #[test]
    fn test_report_in_same_time_step_keeps_last_value() {
        let mut acc = Accumulator::new();
        let key = SeriesKey::report("Cd");
        acc.record(&[
            Sample::new(key.clone(), 0.5, 1.0),
            Sample::new(key.clone(), 0.5, 1.2),
        ]);
        assert_eq!(acc.get(&key).unwrap().points(), &[Point::new(0.5, 1.2)]);
    }

    #[test]
    fn test_latest_and_recent() {
        let mut acc = Accumulator::new();
        let samples: Vec<Sample> = (1..=100)
            .map(|i| residual("Continuity", i as f64, i as f64))
            .collect();
        acc.record(&samples);
        acc.record(&[Sample::new(SeriesKey::kpi("Y+ maximo"), 0.1, 31.5)]);

        let recent = acc.recent(&SeriesKey::residual("Continuity"), 50);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].ordinate, 51.0);
        assert!(acc.recent(&SeriesKey::residual("Tke"), 50).is_empty());

        assert_eq!(acc.latest(SeriesKind::Kpi, "Y+ maximo"), Some(Point::new(0.1, 31.5)));
        assert_eq!(acc.max_ordinate(SeriesKind::Residual), Some(100.0));
        assert_eq!(acc.of_kind(SeriesKind::Residual).count(), 1);
    }
}
