//! Color theme for the dashboard image.
//!
//! Supports light and dark themes, selected by the `theme` configuration key.

use image::Rgb;
use plotters::style::RGBColor;

/// Line colors cycled through for residuals and reports.
const SERIES_DARK: [[u8; 3]; 8] = [
    [102, 194, 255],
    [255, 170, 90],
    [130, 220, 130],
    [240, 110, 120],
    [190, 150, 255],
    [240, 220, 110],
    [110, 220, 210],
    [230, 140, 200],
];

const SERIES_LIGHT: [[u8; 3]; 8] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [23, 190, 207],
    [227, 119, 194],
];

/// Colors used by the dashboard composer.
///
/// Use [`Theme::dark()`] or [`Theme::light()`].
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Canvas background between panels.
    pub background: [u8; 3],
    /// Panel fill.
    pub panel: [u8; 3],
    /// Panel borders and plot axes.
    pub border: [u8; 3],
    /// Grid lines inside plots.
    pub grid: [u8; 3],
    /// Titles and labels.
    pub text: [u8; 3],
    /// Tick labels and secondary text.
    pub muted: [u8; 3],
    /// KPI annotation box fill.
    pub kpi_fill: [u8; 3],
    /// KPI annotation text.
    pub kpi_text: [u8; 3],
    series: [[u8; 3]; 8],
}

impl Theme {
    /// Dark theme, the default.
    pub fn dark() -> Self {
        Self {
            background: [12, 14, 20],
            panel: [20, 23, 32],
            border: [90, 96, 120],
            grid: [40, 44, 60],
            text: [225, 228, 240],
            muted: [150, 160, 184],
            kpi_fill: [92, 78, 44],
            kpi_text: [255, 236, 190],
            series: SERIES_DARK,
        }
    }

    /// Light theme for printing or light viewers.
    pub fn light() -> Self {
        Self {
            background: [236, 238, 242],
            panel: [255, 255, 255],
            border: [120, 124, 136],
            grid: [222, 224, 230],
            text: [24, 26, 32],
            muted: [96, 100, 112],
            kpi_fill: [245, 222, 179],
            kpi_text: [40, 30, 10],
            series: SERIES_LIGHT,
        }
    }

    /// Line color for the `idx`-th series.
    pub fn series_color(&self, idx: usize) -> [u8; 3] {
        self.series[idx % self.series.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

/// Convert to an `image` pixel.
pub fn px(color: [u8; 3]) -> Rgb<u8> {
    Rgb(color)
}

/// Convert to a `plotters` color.
pub fn rgb(color: [u8; 3]) -> RGBColor {
    RGBColor(color[0], color[1], color[2])
}
