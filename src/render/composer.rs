//! Dashboard composer.
//!
//! Lays out the status image:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ title · cycle · iteration · physical time                    │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │ residuals (log y)            │ reports vs time     [KPI box] │
//! │   full history               │                               │
//! │   last N iterations          │                               │
//! ├──────────────────────────────┼───────────────────────────────┤
//! │ scene: Pressure              │ scene: Velocity               │
//! └──────────────────────────────┴───────────────────────────────┘
//! ```

use std::io::Cursor;
use std::iter;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use simwatch_types::{Point, SeriesKey, SeriesKind};
use tracing::{debug, warn};

use super::canvas::{Canvas, Rect};
use super::glyphs::{text_height, text_width, truncate};
use super::theme::{rgb, Theme};
use crate::data::DashboardState;
use crate::error::{MonitorError, Result};
use crate::source::write_atomic;

pub const DEFAULT_WIDTH: u32 = 1800;
pub const DEFAULT_HEIGHT: u32 = 1000;

const HEADER_HEIGHT: u32 = 40;
const GAP: u32 = 12;
const PANEL_TITLE_HEIGHT: u32 = 30;
const TITLE_SCALE: u32 = 3;
const LABEL_SCALE: u32 = 2;
const PLOT_MARGIN_LEFT: u32 = 64;
const PLOT_MARGIN_BOTTOM: u32 = 22;
const MAX_TICKS: usize = 6;

/// What the dashboard shows and how it looks.
#[derive(Debug, Clone)]
pub struct DashboardLayout {
    pub width: u32,
    pub height: u32,
    /// Shown in the header bar.
    pub title: String,
    /// Report names plotted as lines.
    pub reports: Vec<String>,
    /// KPI names shown as text boxes.
    pub kpis: Vec<String>,
    /// Scene categories, one bottom panel each.
    pub categories: Vec<String>,
    /// Iterations shown in the zoomed residual plot.
    pub recent_window: usize,
    /// Fixed y range for the report plot.
    pub report_y_limits: Option<(f64, f64)>,
    pub theme: Theme,
}

impl Default for DashboardLayout {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            title: String::new(),
            reports: Vec::new(),
            kpis: Vec::new(),
            categories: vec!["Pressure".to_string(), "Velocity".to_string()],
            recent_window: 50,
            report_y_limits: None,
            theme: Theme::dark(),
        }
    }
}

struct Panels {
    header: Rect,
    residuals: Rect,
    reports: Rect,
    scenes: Vec<Rect>,
}

impl DashboardLayout {
    fn panels(&self) -> Panels {
        let header = Rect::new(0, 0, self.width, HEADER_HEIGHT);
        let body = Rect::new(0, HEADER_HEIGHT, self.width, self.height.saturating_sub(HEADER_HEIGHT))
            .inset(GAP);
        let (top, bottom) = body.split_rows(0.5, GAP);

        let half = top.width().saturating_sub(GAP) / 2;
        let residuals = Rect { x1: top.x0 + half, ..top };
        let reports = Rect {
            x0: (top.x0 + half + GAP).min(top.x1),
            ..top
        };

        let count = self.categories.len().max(1) as u32;
        let cell = bottom.width().saturating_sub(GAP * (count - 1)) / count;
        let scenes = (0..count)
            .map(|i| Rect::new(bottom.x0 + i * (cell + GAP), bottom.y0, cell, bottom.height()))
            .collect();

        Panels {
            header,
            residuals,
            reports,
            scenes,
        }
    }
}

/// Renders a [`DashboardState`] into the status image.
#[derive(Debug, Clone, Default)]
pub struct DashboardComposer {
    layout: DashboardLayout,
}

impl DashboardComposer {
    pub fn new(layout: DashboardLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DashboardLayout {
        &self.layout
    }

    /// Render and atomically replace `output_path`.
    ///
    /// On failure the previous image at `output_path` is left untouched.
    pub fn render(&self, state: &DashboardState, output_path: &Path) -> Result<()> {
        let image = self.compose(state)?;

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| MonitorError::RenderFailure(format!("png encode: {}", e)))?;

        write_atomic(output_path, &bytes).map_err(|e| MonitorError::RenderFailure(e.to_string()))?;
        debug!(path = %output_path.display(), bytes = bytes.len(), "dashboard written");
        Ok(())
    }

    /// Build the dashboard image in memory.
    pub fn compose(&self, state: &DashboardState) -> Result<RgbImage> {
        let layout = &self.layout;
        let theme = &layout.theme;
        let panels = layout.panels();
        let mut canvas = Canvas::new(layout.width, layout.height, theme.background);

        self.draw_header(&mut canvas, panels.header, state);
        self.draw_residuals(&mut canvas, panels.residuals, state)?;
        self.draw_reports(&mut canvas, panels.reports, state)?;
        for (category, rect) in layout.categories.iter().zip(panels.scenes) {
            self.draw_scene(&mut canvas, rect, category, state);
        }

        Ok(canvas.into_image())
    }

    fn draw_header(&self, canvas: &mut Canvas, rect: Rect, state: &DashboardState) {
        let theme = &self.layout.theme;
        canvas.fill_rect(rect, theme.panel);

        let title = if self.layout.title.is_empty() {
            state.case_name.as_str()
        } else {
            self.layout.title.as_str()
        };
        let y = rect.y0 + (rect.height().saturating_sub(text_height(TITLE_SCALE))) / 2;
        canvas.text(rect.x0 + GAP, y, title, theme.text, TITLE_SCALE);

        let mut status = vec![format!("cycle {}", state.cycle)];
        if let Some(iteration) = state.latest_iteration() {
            status.push(format!("iteration {}", iteration));
        }
        if let Some(time) = state.latest_time() {
            status.push(format!("time {}", format_tick(time)));
        }
        let status = status.join("   ");
        let x = rect.x1.saturating_sub(text_width(&status, LABEL_SCALE) + GAP);
        let y = rect.y0 + (rect.height().saturating_sub(text_height(LABEL_SCALE))) / 2;
        canvas.text(x, y, &status, theme.muted, LABEL_SCALE);
    }

    fn panel_frame(&self, canvas: &mut Canvas, rect: Rect, title: &str) -> Rect {
        let theme = &self.layout.theme;
        canvas.fill_rect(rect, theme.panel);
        canvas.draw_border(rect, theme.border);
        canvas.text(rect.x0 + 10, rect.y0 + 10, title, theme.text, LABEL_SCALE);
        rect.below(PANEL_TITLE_HEIGHT).inset(4)
    }

    fn draw_residuals(&self, canvas: &mut Canvas, rect: Rect, state: &DashboardState) -> Result<()> {
        let theme = &self.layout.theme;
        let inner = self.panel_frame(canvas, rect, "Residuals vs iteration");

        let residuals: Vec<_> = state.series.of_kind(SeriesKind::Residual).collect();
        if residuals.iter().all(|s| s.is_empty()) {
            placeholder(canvas, inner, "waiting for data", theme);
            return Ok(());
        }

        let full: Vec<PlotLine> = residuals
            .iter()
            .enumerate()
            .map(|(idx, s)| PlotLine::new(&s.key.name, theme.series_color(idx), s.points()))
            .collect();
        let window = self.layout.recent_window;
        let recent: Vec<PlotLine> = residuals
            .iter()
            .enumerate()
            .map(|(idx, s)| PlotLine::new(&s.key.name, theme.series_color(idx), s.last_n(window)))
            .collect();

        let (top, bottom) = inner.split_rows(0.58, 8);
        let bottom_title = format!("last {} iterations", window);
        canvas.text(bottom.x0 + 6, bottom.y0, &bottom_title, theme.muted, LABEL_SCALE);
        let bottom = bottom.below(text_height(LABEL_SCALE) + 4);

        draw_line_plot(canvas, top, theme, &full, Scale::Log10, None)?;
        draw_line_plot(canvas, bottom, theme, &recent, Scale::Log10, None)?;
        draw_legend(canvas, top, theme, &full, true);
        Ok(())
    }

    fn draw_reports(&self, canvas: &mut Canvas, rect: Rect, state: &DashboardState) -> Result<()> {
        let theme = &self.layout.theme;
        let inner = self.panel_frame(canvas, rect, "Reports vs physical time");

        let lines: Vec<PlotLine> = self
            .layout
            .reports
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                let series = state.series.get(&SeriesKey::report(name))?;
                (!series.is_empty())
                    .then(|| PlotLine::new(name, theme.series_color(idx), series.points()))
            })
            .collect();

        if lines.is_empty() {
            placeholder(canvas, inner, "no report data", theme);
        } else {
            draw_line_plot(
                canvas,
                inner,
                theme,
                &lines,
                Scale::Linear,
                self.layout.report_y_limits,
            )?;
            draw_legend(canvas, inner, theme, &lines, false);
        }

        self.draw_kpis(canvas, inner, state);
        Ok(())
    }

    fn draw_kpis(&self, canvas: &mut Canvas, rect: Rect, state: &DashboardState) {
        let theme = &self.layout.theme;
        let mut y = rect.y0 + 8;
        for (name, value) in state.kpi_values(&self.layout.kpis) {
            let Some(value) = value else {
                continue;
            };
            let text = format!("last {}: {:.2}", name, value);
            let scale = LABEL_SCALE + 1;
            let width = text_width(&text, scale) + 20;
            let height = text_height(scale) + 16;
            let boxed = Rect::new(rect.x1.saturating_sub(width + 12), y, width, height);
            canvas.fill_rect(boxed, theme.kpi_fill);
            canvas.draw_border(boxed, theme.border);
            canvas.text(boxed.x0 + 10, boxed.y0 + 8, &text, theme.kpi_text, scale);
            y += height + 8;
        }
    }

    fn draw_scene(&self, canvas: &mut Canvas, rect: Rect, category: &str, state: &DashboardState) {
        let theme = &self.layout.theme;
        let Some(artifact) = state.scene(category) else {
            let inner = self.panel_frame(canvas, rect, category);
            placeholder(canvas, inner, &format!("{} not available", category), theme);
            return;
        };

        let max_chars = (rect.width() / (4 * LABEL_SCALE)).saturating_sub(4) as usize;
        let title = truncate(&format!("{} - {}", category, artifact.remote_name), max_chars);
        let inner = self.panel_frame(canvas, rect, &title);

        let decoded = match image::open(&artifact.local_path) {
            Ok(img) => img.to_rgb8(),
            Err(err) => {
                warn!(%category, path = %artifact.local_path.display(), error = %err, "scene image unreadable");
                placeholder(canvas, inner, &format!("{} unreadable", category), theme);
                return;
            }
        };

        let fitted = fit_within(&decoded, inner.width(), inner.height());
        let x = inner.x0 + (inner.width() - fitted.width()) / 2;
        let y = inner.y0 + (inner.height() - fitted.height()) / 2;
        canvas.blit(&fitted, x, y);
    }
}

/// Scale `image` to fit `width` x `height`, keeping its aspect ratio.
fn fit_within(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 || width == 0 || height == 0 {
        return RgbImage::new(0, 0);
    }
    let scale = f64::min(width as f64 / iw as f64, height as f64 / ih as f64);
    let w = ((iw as f64 * scale) as u32).clamp(1, width);
    let h = ((ih as f64 * scale) as u32).clamp(1, height);
    imageops::resize(image, w, h, FilterType::Triangle)
}

fn placeholder(canvas: &mut Canvas, rect: Rect, text: &str, theme: &Theme) {
    let y = rect.y0 + rect.height().saturating_sub(text_height(LABEL_SCALE + 1)) / 2;
    canvas.text_centered(rect, y, text, theme.muted, LABEL_SCALE + 1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Linear,
    Log10,
}

struct PlotLine<'a> {
    name: &'a str,
    color: [u8; 3],
    points: &'a [Point],
}

impl<'a> PlotLine<'a> {
    fn new(name: &'a str, color: [u8; 3], points: &'a [Point]) -> Self {
        Self {
            name,
            color,
            points,
        }
    }
}

struct TickLabel {
    at: (i32, i32),
    text: String,
    vertical_axis: bool,
}

fn draw_line_plot(
    canvas: &mut Canvas,
    rect: Rect,
    theme: &Theme,
    lines: &[PlotLine],
    scale: Scale,
    y_limits: Option<(f64, f64)>,
) -> Result<()> {
    let project = |p: &Point| -> Option<(f64, f64)> {
        match scale {
            Scale::Linear => Some((p.ordinate, p.value)),
            Scale::Log10 if p.value > 0.0 => Some((p.ordinate, p.value.log10())),
            Scale::Log10 => None,
        }
    };
    let projected: Vec<(&PlotLine, Vec<(f64, f64)>)> = lines
        .iter()
        .map(|line| (line, line.points.iter().filter_map(&project).collect()))
        .collect();

    let all = projected.iter().flat_map(|(_, pts)| pts.iter());
    let Some((x_lo, x_hi, y_lo, y_hi)) = bounds(all) else {
        placeholder(canvas, rect, "waiting for data", theme);
        return Ok(());
    };

    let (x0, x1) = padded(x_lo, x_hi);
    let (y0, y1, y_ticks) = match (scale, y_limits) {
        (_, Some((lo, hi))) => (lo, hi, nice_ticks(lo, hi, MAX_TICKS)),
        (Scale::Log10, None) => {
            let lo = y_lo.floor();
            let hi = if y_hi.ceil() > lo { y_hi.ceil() } else { lo + 1.0 };
            (lo, hi, decades(lo, hi))
        }
        (Scale::Linear, None) => {
            let (lo, hi) = padded(y_lo, y_hi);
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad, nice_ticks(lo - pad, hi + pad, MAX_TICKS))
        }
    };
    let x_ticks = nice_ticks(x0, x1, MAX_TICKS);

    let mut labels: Vec<TickLabel> = Vec::new();
    canvas.paint_plot(rect, theme.panel, |area| {
        let mut chart = ChartBuilder::on(&area)
            .margin_left(PLOT_MARGIN_LEFT)
            .margin_right(12)
            .margin_top(8)
            .margin_bottom(PLOT_MARGIN_BOTTOM)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        for &x in &x_ticks {
            chart.draw_series(iter::once(PathElement::new(
                vec![(x, y0), (x, y1)],
                rgb(theme.grid).stroke_width(1),
            )))?;
            labels.push(TickLabel {
                at: chart.backend_coord(&(x, y0)),
                text: format_tick(x),
                vertical_axis: false,
            });
        }
        for &y in &y_ticks {
            chart.draw_series(iter::once(PathElement::new(
                vec![(x0, y), (x1, y)],
                rgb(theme.grid).stroke_width(1),
            )))?;
            let text = match scale {
                Scale::Log10 => format!("1e{}", y as i32),
                Scale::Linear => format_tick(y),
            };
            labels.push(TickLabel {
                at: chart.backend_coord(&(x0, y)),
                text,
                vertical_axis: true,
            });
        }

        chart.draw_series(iter::once(PathElement::new(
            vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)],
            rgb(theme.border).stroke_width(1),
        )))?;

        for (line, points) in &projected {
            if points.is_empty() {
                continue;
            }
            let clamped = points.iter().map(|&(x, y)| (x, y.clamp(y0, y1)));
            chart.draw_series(LineSeries::new(clamped, rgb(line.color).stroke_width(2)))?;
        }
        Ok(())
    })?;

    let label_height = text_height(LABEL_SCALE) as i32;
    for label in labels {
        let width = text_width(&label.text, LABEL_SCALE) as i32;
        let (x, y) = if label.vertical_axis {
            (label.at.0 - width - 6, label.at.1 - label_height / 2)
        } else {
            (label.at.0 - width / 2, label.at.1 + 6)
        };
        if x < 0 || y < 0 {
            continue;
        }
        canvas.text(rect.x0 + x as u32, rect.y0 + y as u32, &label.text, theme.muted, LABEL_SCALE);
    }
    Ok(())
}

fn draw_legend(canvas: &mut Canvas, rect: Rect, theme: &Theme, lines: &[PlotLine], right: bool) {
    let row = text_height(LABEL_SCALE) + 6;
    let widest = lines
        .iter()
        .map(|l| text_width(l.name, LABEL_SCALE))
        .max()
        .unwrap_or(0);
    let width = widest + 36;
    let x = if right {
        rect.x1.saturating_sub(width + 20)
    } else {
        rect.x0 + PLOT_MARGIN_LEFT + 8
    };
    let mut y = rect.y0 + 14;

    for line in lines.iter().filter(|l| !l.points.is_empty()) {
        if y + row > rect.y1 {
            break;
        }
        canvas.fill_rect(Rect::new(x, y + 3, 18, 4), line.color);
        canvas.text(x + 26, y, line.name, theme.text, LABEL_SCALE);
        y += row;
    }
}

fn bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Option<(f64, f64, f64, f64)> {
    points.fold(None, |acc, &(x, y)| match acc {
        None => Some((x, x, y, y)),
        Some((x0, x1, y0, y1)) => Some((x0.min(x), x1.max(x), y0.min(y), y1.max(y))),
    })
}

/// Widen a degenerate range so plotters gets a non-empty axis.
fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if hi - lo > f64::EPSILON * lo.abs().max(1.0) {
        return (lo, hi);
    }
    let pad = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
    (lo - pad, hi + pad)
}

/// Integer decades covering `[lo, hi]`.
fn decades(lo: f64, hi: f64) -> Vec<f64> {
    let step = ((hi - lo) / MAX_TICKS as f64).ceil().max(1.0);
    let mut ticks = Vec::new();
    let mut d = lo;
    while d <= hi + 1e-9 {
        ticks.push(d);
        d += step;
    }
    ticks
}

/// Round tick positions (1, 2 or 5 times a power of ten) inside `[lo, hi]`.
pub(crate) fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let span = hi - lo;
    if !(span > 0.0) || !span.is_finite() {
        return Vec::new();
    }
    let raw = span / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let mut ticks = Vec::new();
    let mut tick = (lo / step).ceil() * step;
    while tick <= hi + step * 1e-9 && ticks.len() <= target * 2 {
        // Avoid "-0" labels.
        ticks.push(if tick.abs() < step * 1e-9 { 0.0 } else { tick });
        tick += step;
    }
    ticks
}

/// Compact number formatting for axis labels.
pub(crate) fn format_tick(value: f64) -> String {
    let abs = value.abs();
    if value == 0.0 {
        "0".to_string()
    } else if !(1e-3..1e5).contains(&abs) {
        format!("{:.1e}", value)
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let text = format!("{:.4}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
