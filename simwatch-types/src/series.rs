//! Ordered series with idempotent merge.

use crate::SeriesKey;

/// A single `(ordinate, value)` pair inside a [`Series`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub ordinate: f64,
    pub value: f64,
}

impl Point {
    pub const fn new(ordinate: f64, value: f64) -> Self {
        Self { ordinate, value }
    }
}

/// Outcome of one [`Series::merge`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Points whose ordinate was beyond the previous maximum.
    pub appended: usize,
    /// Points that rewrote the value of an ordinate already present.
    pub replaced: usize,
    /// Points discarded as duplicates or out-of-order.
    pub dropped: usize,
}

impl MergeStats {
    /// Whether the merge changed the series at all.
    pub fn changed(&self) -> bool {
        self.appended > 0 || self.replaced > 0
    }

    /// Combine two merge results.
    pub fn absorb(&mut self, other: MergeStats) {
        self.appended += other.appended;
        self.replaced += other.replaced;
        self.dropped += other.dropped;
    }
}

/// Ordered history of one named signal.
///
/// Ordinates are strictly increasing. Merging the same batch twice leaves
/// the series exactly as one merge did, so overlapping read windows are
/// harmless.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Series {
    pub key: SeriesKey,
    points: Vec<Point>,
}

impl Series {
    /// Create an empty series.
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            points: Vec::new(),
        }
    }

    /// Merge new points into the series.
    ///
    /// - ordinate greater than the current maximum: appended
    /// - ordinate already present with a different value: the value is
    ///   replaced (last write wins)
    /// - anything else, including non-finite input: dropped
    pub fn merge<I>(&mut self, points: I) -> MergeStats
    where
        I: IntoIterator<Item = Point>,
    {
        let mut stats = MergeStats::default();

        for point in points {
            if !point.ordinate.is_finite() || !point.value.is_finite() {
                stats.dropped += 1;
                continue;
            }

            match self.max_ordinate() {
                Some(max) if point.ordinate <= max => {
                    match self
                        .points
                        .binary_search_by(|p| p.ordinate.total_cmp(&point.ordinate))
                    {
                        Ok(idx) if self.points[idx].value != point.value => {
                            self.points[idx].value = point.value;
                            stats.replaced += 1;
                        }
                        _ => stats.dropped += 1,
                    }
                }
                _ => {
                    self.points.push(point);
                    stats.appended += 1;
                }
            }
        }

        stats
    }

    /// Largest ordinate seen so far.
    pub fn max_ordinate(&self) -> Option<f64> {
        self.points.last().map(|p| p.ordinate)
    }

    /// Most recent point.
    pub fn latest(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// All points in ordinate order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The last `n` points, or all of them if the series is shorter.
    pub fn last_n(&self, n: usize) -> &[Point] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|&(o, v)| Point::new(o, v)).collect()
    }

    fn residual() -> Series {
        Series::new(SeriesKey::residual("Continuity"))
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut series = residual();
        let stats = series.merge(pts(&[(1.0, 0.1), (2.0, 0.05), (3.0, 0.01)]));

        assert_eq!(stats.appended, 3);
        assert_eq!(series.len(), 3);
        assert_eq!(series.max_ordinate(), Some(3.0));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = pts(&[(1.0, 0.1), (2.0, 0.05), (3.0, 0.01)]);

        let mut once = residual();
        once.merge(batch.clone());

        let mut twice = residual();
        twice.merge(batch.clone());
        let stats = twice.merge(batch);

        assert_eq!(once, twice);
        assert!(!stats.changed());
        assert_eq!(stats.dropped, 3);
    }

    #[test]
    fn test_merge_overlapping_window() {
        let mut series = residual();
        series.merge(pts(&[(1.0, 0.1), (2.0, 0.05)]));
        let stats = series.merge(pts(&[(2.0, 0.05), (3.0, 0.02), (4.0, 0.01)]));

        assert_eq!(stats.appended, 2);
        assert_eq!(stats.dropped, 1);
        let ordinates: Vec<f64> = series.iter().map(|p| p.ordinate).collect();
        assert_eq!(ordinates, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_merge_last_write_wins_for_equal_ordinate() {
        let mut series = residual();
        series.merge(pts(&[(1.0, 0.1), (2.0, 0.05)]));
        let stats = series.merge(pts(&[(2.0, 0.07)]));

        assert_eq!(stats.replaced, 1);
        assert_eq!(series.len(), 2);
        assert_eq!(series.latest(), Some(Point::new(2.0, 0.07)));
    }

    #[test]
    fn test_merge_rewrites_interior_ordinate() {
        let mut series = residual();
        series.merge(pts(&[(1.0, 0.1), (2.0, 0.05), (3.0, 0.02)]));
        series.merge(pts(&[(2.0, 0.06)]));

        assert_eq!(series.points()[1], Point::new(2.0, 0.06));
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_merge_drops_unknown_ordinate_below_max() {
        let mut series = residual();
        series.merge(pts(&[(1.0, 0.1), (3.0, 0.02)]));
        let stats = series.merge(pts(&[(2.0, 0.05)]));

        assert_eq!(stats.dropped, 1);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_merge_same_ordinate_within_batch_is_idempotent() {
        // Several inner iterations of one time step share a time ordinate.
        let batch = pts(&[(0.5, 10.0), (0.5, 11.0), (0.5, 12.0), (1.0, 13.0)]);

        let mut once = Series::new(SeriesKey::report("Cd"));
        once.merge(batch.clone());
        let mut twice = once.clone();
        twice.merge(batch);

        assert_eq!(once, twice);
        assert_eq!(once.points(), &pts(&[(0.5, 12.0), (1.0, 13.0)])[..]);
    }

    #[test]
    fn test_merge_rejects_non_finite() {
        let mut series = residual();
        let stats = series.merge(pts(&[(1.0, f64::NAN), (f64::INFINITY, 1.0), (2.0, 0.1)]));

        assert_eq!(stats.dropped, 2);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_last_n_is_a_slice_view() {
        let mut series = residual();
        series.merge((1..=100).map(|i| Point::new(i as f64, 1.0 / i as f64)));

        let recent = series.last_n(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].ordinate, 91.0);
        assert_eq!(series.last_n(1_000).len(), 100);
        assert!(residual().last_n(5).is_empty());
    }
}
