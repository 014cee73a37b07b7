//! Line classification rules for the series parser.
//!
//! Each [`Rule`] pairs a predicate with an extractor. The parser tries the
//! rules in order and applies the first one whose predicate holds, so a new
//! log format is supported by adding a rule rather than editing control flow.

use simwatch_types::{Sample, SeriesKey, SeriesKind};
use tracing::debug;

use super::parser::{LogSchema, ParseOutcome, ParserState};
use crate::error::{MonitorError, Result};

/// Cell content meaning "no value for this column in this row".
pub const EMPTY_CELL: &str = "---";

type Predicate = fn(&str, &LogSchema, &ParserState) -> bool;
type Extractor = fn(&str, &LogSchema, &mut ParserState, &mut ParseOutcome) -> Result<()>;

/// A `{predicate, extractor}` pair.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: Predicate,
    pub extract: Extractor,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

impl Rule {
    pub const fn new(name: &'static str, matches: Predicate, extract: Extractor) -> Self {
        Self {
            name,
            matches,
            extract,
        }
    }
}

/// The built-in rule set, in priority order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("blank", is_blank, ignore),
        Rule::new("comment", is_comment, ignore),
        Rule::new("time-marker", is_time_marker, extract_time_marker),
        Rule::new("header", is_header, extract_header),
        Rule::new("data-row", is_data_row, extract_data_row),
    ]
}

fn is_blank(line: &str, _: &LogSchema, _: &ParserState) -> bool {
    line.trim().is_empty()
}

fn is_comment(line: &str, _: &LogSchema, _: &ParserState) -> bool {
    let line = line.trim_start();
    line.starts_with('#') || line.starts_with("//")
}

fn ignore(_: &str, _: &LogSchema, _: &mut ParserState, _: &mut ParseOutcome) -> Result<()> {
    Ok(())
}

fn is_time_marker(line: &str, _: &LogSchema, _: &ParserState) -> bool {
    line.trim_start().starts_with("TimeStep")
}

/// `TimeStep 12: Time 0.0012`
fn extract_time_marker(
    line: &str,
    _: &LogSchema,
    state: &mut ParserState,
    _: &mut ParseOutcome,
) -> Result<()> {
    let malformed = |reason: &str| MonitorError::MalformedRecord {
        line_no: state.line_no,
        reason: format!("{}: {:?}", reason, line.trim()),
    };

    let rest = line.trim().trim_start_matches("TimeStep");
    let (step, time) = rest.split_once(':').ok_or_else(|| malformed("time marker without ':'"))?;
    let step: u64 = step
        .trim()
        .parse()
        .map_err(|_| malformed("bad time step number"))?;
    let time = time
        .trim()
        .strip_prefix("Time")
        .ok_or_else(|| malformed("time marker without 'Time'"))?;
    let time = parse_value(time.trim()).map_err(|reason| malformed(&reason))?;

    state.time_step = Some(step);
    state.current_time = Some(time);
    Ok(())
}

/// Split a header line into column names.
///
/// Columns are separated by runs of at least `gap` spaces, so with the
/// default gap of two, names may contain single spaces (`Y+ maximo`). Tabs
/// always count as a column break.
pub fn header_columns(line: &str, gap: usize) -> Vec<String> {
    let separator = " ".repeat(gap.max(1));
    line.replace('\t', &separator)
        .split(separator.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_header(line: &str, schema: &LogSchema, _: &ParserState) -> bool {
    let line = line.trim();
    line.starts_with(schema.header_prefix())
        && header_columns(line, schema.column_gap())
            .iter()
            .any(|c| schema.is_residual(c))
}

fn extract_header(
    line: &str,
    schema: &LogSchema,
    state: &mut ParserState,
    _: &mut ParseOutcome,
) -> Result<()> {
    let mut residuals = Vec::new();
    let mut reports = Vec::new();

    for (idx, column) in header_columns(line.trim(), schema.column_gap())
        .into_iter()
        .enumerate()
    {
        match schema.classify(&column) {
            Some(SeriesKind::Residual) => residuals.push((idx, SeriesKey::residual(column))),
            Some(kind) => reports.push((idx, SeriesKey::new(kind, column))),
            None => {}
        }
    }

    debug!(
        line_no = state.line_no,
        residuals = residuals.len(),
        reports = reports.len(),
        "log header"
    );
    if !residuals.is_empty() {
        state.residual_columns = residuals;
    }
    if !reports.is_empty() {
        state.report_columns = reports;
    }
    Ok(())
}

fn is_data_row(line: &str, _: &LogSchema, state: &ParserState) -> bool {
    let first = line.split_whitespace().next().unwrap_or_default();
    state.has_header() && !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit())
}

fn extract_data_row(
    line: &str,
    _: &LogSchema,
    state: &mut ParserState,
    outcome: &mut ParseOutcome,
) -> Result<()> {
    let cells: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = cells.first() else {
        return Ok(());
    };
    let iteration: u64 = first.parse().map_err(|_| MonitorError::MalformedRecord {
        line_no: state.line_no,
        reason: format!("iteration out of range: {}", first),
    })?;
    state.iteration = Some(iteration);

    let line_no = state.line_no;
    let mut emit = |key: &SeriesKey, idx: usize, ordinate: f64| match cells.get(idx) {
        Some(&EMPTY_CELL) => {}
        Some(cell) => match parse_value(cell) {
            Ok(value) => outcome.samples.push(Sample::new(key.clone(), ordinate, value)),
            Err(reason) => {
                outcome.dropped_cells += 1;
                debug!(line_no, series = %key, %reason, "cell dropped");
            }
        },
        None => {
            outcome.dropped_cells += 1;
            debug!(line_no, series = %key, "cell missing");
        }
    };

    for (idx, key) in &state.residual_columns {
        emit(key, *idx, iteration as f64);
    }
    // Report values are indexed by physical time, unknown before the first marker.
    if let Some(time) = state.current_time {
        for (idx, key) in &state.report_columns {
            emit(key, *idx, time);
        }
    }
    Ok(())
}

/// Parse a finite float.
fn parse_value(cell: &str) -> std::result::Result<f64, String> {
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(v) => Err(format!("non-finite value {}", v)),
        Err(_) => Err(format!("not a number: {:?}", cell)),
    }
}
