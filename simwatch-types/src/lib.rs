//! # simwatch-types
//!
//! Core data model for simwatch. These types describe what the monitor
//! extracts from a running simulation, independent of how it was fetched
//! or how it will be drawn.
//!
//! ## Overview
//!
//! - [`Sample`]: one parsed value for one named signal at one ordinate
//!   (iteration number or physical time)
//! - [`Series`]: the ordered, de-duplicated history of one signal, with the
//!   idempotent merge used by the accumulator
//! - [`SceneArtifact`]: the most recent rendered scene image for one category
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for every type
//!
//! ## Example
//!
//! ```rust
//! use simwatch_types::{Point, Series, SeriesKey};
//!
//! let mut series = Series::new(SeriesKey::residual("Continuity"));
//! let batch = [Point::new(1.0, 1e-2), Point::new(2.0, 5e-3)];
//!
//! series.merge(batch);
//! // Replaying an overlapping window changes nothing.
//! let stats = series.merge(batch);
//!
//! assert_eq!(series.len(), 2);
//! assert_eq!(stats.appended, 0);
//! ```

mod sample;
mod scene;
mod series;

pub use sample::*;
pub use scene::*;
pub use series::*;
