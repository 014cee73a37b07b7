//! Series parser.
//!
//! Turns whole log lines into [`Sample`]s. The parser is stateful across
//! increments: the column map from the last header and the physical time
//! from the last `TimeStep` marker carry over to the next call, so a table
//! split across two polls parses exactly as if it had arrived at once.

use simwatch_types::{Sample, SeriesKey, SeriesKind};
use tracing::debug;

use super::rules::{default_rules, Rule};

/// Header prefix of the simulation's residual table.
pub const DEFAULT_HEADER_PREFIX: &str = "Iteration";

/// Spaces separating two header columns; names may contain single spaces.
pub const DEFAULT_COLUMN_GAP: usize = 2;

/// How the log is laid out and which columns feed which series.
///
/// Besides the column roles, the schema carries the header convention: a
/// header line starts with `header_prefix` and its column names are
/// separated by at least `column_gap` spaces (or a tab). Data rows are
/// whitespace-separated and mapped to the header positionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSchema {
    residuals: Vec<String>,
    reports: Vec<String>,
    kpis: Vec<String>,
    header_prefix: String,
    column_gap: usize,
}

impl Default for LogSchema {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}

impl LogSchema {
    /// Residual columns are indexed by iteration; report and KPI columns by
    /// physical time. A name listed as KPI is treated as a KPI even when it
    /// also appears in `reports`.
    pub fn new(residuals: Vec<String>, reports: Vec<String>, kpis: Vec<String>) -> Self {
        Self {
            residuals,
            reports,
            kpis,
            header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
            column_gap: DEFAULT_COLUMN_GAP,
        }
    }

    /// Use a different header convention. A gap of zero is treated as one.
    pub fn with_header_convention(mut self, prefix: impl Into<String>, column_gap: usize) -> Self {
        self.header_prefix = prefix.into();
        self.column_gap = column_gap.max(1);
        self
    }

    pub fn residuals(&self) -> &[String] {
        &self.residuals
    }

    pub fn reports(&self) -> &[String] {
        &self.reports
    }

    pub fn kpis(&self) -> &[String] {
        &self.kpis
    }

    pub fn header_prefix(&self) -> &str {
        &self.header_prefix
    }

    pub fn column_gap(&self) -> usize {
        self.column_gap
    }

    pub fn is_residual(&self, column: &str) -> bool {
        self.residuals.iter().any(|r| r == column)
    }

    /// Series family of a header column, if it is tracked at all.
    pub fn classify(&self, column: &str) -> Option<SeriesKind> {
        if self.is_residual(column) {
            Some(SeriesKind::Residual)
        } else if self.kpis.iter().any(|k| k == column) {
            Some(SeriesKind::Kpi)
        } else if self.reports.iter().any(|r| r == column) {
            Some(SeriesKind::Report)
        } else {
            None
        }
    }
}

/// Parser state carried between lines and between increments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserState {
    /// Lines seen since the last reset, 1-based once parsing starts.
    pub line_no: usize,
    pub time_step: Option<u64>,
    /// Physical time of the current time step.
    pub current_time: Option<f64>,
    /// Last iteration number seen in a data row.
    pub iteration: Option<u64>,
    /// `(cell index, series)` for residual columns of the last header.
    pub residual_columns: Vec<(usize, SeriesKey)>,
    /// `(cell index, series)` for report and KPI columns.
    pub report_columns: Vec<(usize, SeriesKey)>,
}

impl ParserState {
    pub fn has_header(&self) -> bool {
        !self.residual_columns.is_empty() || !self.report_columns.is_empty()
    }
}

/// Result of parsing one increment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    /// Samples in the order their rows appeared.
    pub samples: Vec<Sample>,
    /// Lines that matched no rule or whose rule failed.
    pub skipped_lines: usize,
    /// Cells that could not be read as a finite number.
    pub dropped_cells: usize,
}

/// Line-oriented, rule-driven log parser.
#[derive(Debug, Clone)]
pub struct SeriesParser {
    schema: LogSchema,
    rules: Vec<Rule>,
    state: ParserState,
}

impl SeriesParser {
    pub fn new(schema: LogSchema) -> Self {
        Self {
            schema,
            rules: default_rules(),
            state: ParserState::default(),
        }
    }

    /// Add a rule that is tried before the built-in ones.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn schema(&self) -> &LogSchema {
        &self.schema
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Forget headers and time markers, e.g. after the log was truncated.
    pub fn reset(&mut self) {
        self.state = ParserState::default();
    }

    /// Parse a block of complete lines.
    pub fn parse(&mut self, text: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        for line in text.lines() {
            self.state.line_no += 1;
            let rule = self
                .rules
                .iter()
                .find(|rule| (rule.matches)(line, &self.schema, &self.state));

            match rule {
                Some(rule) => {
                    if let Err(err) = (rule.extract)(line, &self.schema, &mut self.state, &mut outcome) {
                        outcome.skipped_lines += 1;
                        debug!(rule = rule.name, error = %err, "line skipped");
                    }
                }
                None => outcome.skipped_lines += 1,
            }
        }

        outcome
    }
}
