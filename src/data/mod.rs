//! Parsing and accumulation of simulation series.
//!
//! Raw log text from the [`source`](crate::source) layer is turned into
//! samples and folded into the long-lived [`DashboardState`].
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of poll intervals (e.g., "30s", "2m")
//! - [`rules`]: Ordered line classification rules (blank, comment, time marker, header, data row)
//! - [`parser`]: [`SeriesParser`] driving the rules over whole lines
//! - [`accumulator`]: [`Accumulator`] holding every series for the run
//! - [`state`]: [`DashboardState`], the aggregate handed to the renderer
//!
//! ## Data Flow
//!
//! ```text
//! LogIncrement (complete lines)
//!        │
//!        ▼
//! SeriesParser::parse()  ── rules ──▶ ParseOutcome { samples, skipped_lines, dropped_cells }
//!        │
//!        ▼
//! Accumulator::record()  ──▶ Series::merge() per key
//!        │
//!        ▼
//! DashboardState (series + scenes)
//! ```

pub mod accumulator;
pub mod duration;
pub mod parser;
pub mod rules;
pub mod state;

pub use accumulator::Accumulator;
pub use parser::{LogSchema, ParseOutcome, ParserState, SeriesParser};
pub use rules::Rule;
pub use state::DashboardState;
