//! Samples and series keys.

use core::fmt;

/// Which family a signal belongs to.
///
/// The family decides the ordinate: residuals are indexed by iteration
/// number, reports and KPIs by physical simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SeriesKind {
    /// Per-iteration convergence metric.
    Residual,
    /// Named quantity (force, moment, ...) recorded against physical time.
    Report,
    /// Scalar indicator shown as text; only the latest value matters.
    Kpi,
}

impl SeriesKind {
    /// Short label used in log output.
    pub fn label(&self) -> &'static str {
        match self {
            SeriesKind::Residual => "residual",
            SeriesKind::Report => "report",
            SeriesKind::Kpi => "kpi",
        }
    }
}

/// Identifies one named signal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesKey {
    pub kind: SeriesKind,
    pub name: String,
}

impl SeriesKey {
    pub fn new(kind: SeriesKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn residual(name: impl Into<String>) -> Self {
        Self::new(SeriesKind::Residual, name)
    }

    pub fn report(name: impl Into<String>) -> Self {
        Self::new(SeriesKind::Report, name)
    }

    pub fn kpi(name: impl Into<String>) -> Self {
        Self::new(SeriesKind::Kpi, name)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.label(), self.name)
    }
}

/// One parsed value.
///
/// Immutable once created; the parser emits these in row order and the
/// accumulator folds them into [`Series`](crate::Series).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    pub key: SeriesKey,
    /// Iteration number or physical time, depending on `key.kind`.
    pub ordinate: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(key: SeriesKey, ordinate: f64, value: f64) -> Self {
        Self {
            key,
            ordinate,
            value,
        }
    }

    /// The `(ordinate, value)` pair without the key.
    pub fn point(&self) -> crate::Point {
        crate::Point::new(self.ordinate, self.value)
    }
}
