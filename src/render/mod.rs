//! Dashboard rendering.
//!
//! Produces the status PNG from a [`DashboardState`](crate::data::DashboardState).
//! Plots are drawn with `plotters` onto panel-sized bitmaps, scene images are
//! decoded with `image`, and all text uses a built-in bitmap font.
//!
//! - [`composer`]: [`DashboardComposer`] and its [`DashboardLayout`]
//! - [`canvas`]: pixel canvas and the plotters bridge
//! - [`glyphs`]: 3x5 bitmap font
//! - [`theme`]: dark and light color themes

pub mod canvas;
pub mod composer;
pub mod glyphs;
pub mod theme;

pub use canvas::{Canvas, Rect};
pub use composer::{DashboardComposer, DashboardLayout, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use theme::Theme;
