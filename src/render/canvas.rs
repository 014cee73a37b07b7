//! RGB canvas with plotters panels blitted in.

use image::{Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackendError;

use super::glyphs;
use super::theme::{px, rgb};
use crate::error::{MonitorError, Result};

/// Axis-aligned pixel rectangle, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Shrink by `margin` on every side.
    pub fn inset(&self, margin: u32) -> Self {
        let mx = margin.min(self.width() / 2);
        let my = margin.min(self.height() / 2);
        Self {
            x0: self.x0 + mx,
            y0: self.y0 + my,
            x1: self.x1 - mx,
            y1: self.y1 - my,
        }
    }

    /// Drop `amount` pixels from the top.
    pub fn below(&self, amount: u32) -> Self {
        Self {
            y0: (self.y0 + amount).min(self.y1),
            ..*self
        }
    }

    /// Split horizontally; the top part gets `fraction` of the height.
    pub fn split_rows(&self, fraction: f64, gap: u32) -> (Self, Self) {
        let top_height = (self.height() as f64 * fraction.clamp(0.0, 1.0)) as u32;
        let split = self.y0 + top_height;
        let top = Self { y1: split, ..*self };
        let bottom = Self {
            y0: (split + gap).min(self.y1),
            ..*self
        };
        (top, bottom)
    }
}

pub type PlotResult = std::result::Result<(), DrawingAreaErrorKind<BitMapBackendError>>;

/// The dashboard image under construction.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, px(background)),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.image.width(), self.image.height())
    }

    fn clip(&self, rect: Rect) -> Rect {
        let (width, height) = self.image.dimensions();
        Rect {
            x0: rect.x0.min(width),
            y0: rect.y0.min(height),
            x1: rect.x1.min(width),
            y1: rect.y1.min(height),
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 3]) {
        let rect = self.clip(rect);
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                self.image.put_pixel(x, y, px(color));
            }
        }
    }

    pub fn draw_border(&mut self, rect: Rect, color: [u8; 3]) {
        let rect = self.clip(rect);
        if rect.width() == 0 || rect.height() == 0 {
            return;
        }
        for x in rect.x0..rect.x1 {
            self.image.put_pixel(x, rect.y0, px(color));
            self.image.put_pixel(x, rect.y1 - 1, px(color));
        }
        for y in rect.y0..rect.y1 {
            self.image.put_pixel(rect.x0, y, px(color));
            self.image.put_pixel(rect.x1 - 1, y, px(color));
        }
    }

    /// Copy `source` with its top-left corner at `(x, y)`, clipped to the canvas.
    pub fn blit(&mut self, source: &RgbImage, x: u32, y: u32) {
        let (width, height) = self.image.dimensions();
        for (sx, sy, pixel) in source.enumerate_pixels() {
            let (dx, dy) = (x + sx, y + sy);
            if dx < width && dy < height {
                self.image.put_pixel(dx, dy, *pixel);
            }
        }
    }

    pub fn text(&mut self, x: u32, y: u32, text: &str, color: [u8; 3], scale: u32) {
        glyphs::draw_text(&mut self.image, x, y, text, px(color), scale);
    }

    /// Draw `text` horizontally centered in `rect` at row `y`.
    pub fn text_centered(&mut self, rect: Rect, y: u32, text: &str, color: [u8; 3], scale: u32) {
        let width = glyphs::text_width(text, scale);
        let x = rect.x0 + rect.width().saturating_sub(width) / 2;
        self.text(x, y, text, color, scale);
    }

    /// Render a plotters drawing into `rect`.
    ///
    /// The closure draws on a panel-sized bitmap which is then copied into
    /// the canvas.
    pub fn paint_plot<F>(&mut self, rect: Rect, fill: [u8; 3], draw: F) -> Result<()>
    where
        F: FnOnce(DrawingArea<BitMapBackend<'_>, Shift>) -> PlotResult,
    {
        let rect = self.clip(rect);
        let (width, height) = (rect.width(), rect.height());
        if width == 0 || height == 0 {
            return Ok(());
        }

        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let backend = BitMapBackend::with_buffer(&mut buffer, (width, height));
            let area = backend.into_drawing_area();
            area.fill(&rgb(fill)).map_err(plot_error)?;
            draw(area).map_err(plot_error)?;
        }

        for (idx, chunk) in buffer.chunks_exact(3).enumerate() {
            let idx = idx as u32;
            let (x, y) = (rect.x0 + idx % width, rect.y0 + idx / width);
            self.image.put_pixel(x, y, Rgb([chunk[0], chunk[1], chunk[2]]));
        }
        Ok(())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

fn plot_error(err: DrawingAreaErrorKind<BitMapBackendError>) -> MonitorError {
    MonitorError::RenderFailure(format!("plot: {:?}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_helpers() {
        let rect = Rect::new(10, 20, 100, 50);
        assert_eq!((rect.width(), rect.height()), (100, 50));
        assert_eq!(rect.inset(5), Rect::new(15, 25, 90, 40));

        let (top, bottom) = rect.split_rows(0.6, 4);
        assert_eq!(top.height(), 30);
        assert_eq!(bottom.y0, 54);
        assert_eq!(bottom.y1, 70);
    }

    #[test]
    fn test_fill_and_border_are_clipped() {
        let mut canvas = Canvas::new(10, 10, [0, 0, 0]);
        canvas.fill_rect(Rect::new(5, 5, 20, 20), [9, 9, 9]);
        canvas.draw_border(Rect::new(0, 0, 30, 30), [1, 1, 1]);
        assert_eq!(*canvas.image().get_pixel(9, 9), Rgb([9, 9, 9]));
        assert_eq!(*canvas.image().get_pixel(0, 0), Rgb([1, 1, 1]));
    }

    #[test]
    fn test_paint_plot_fills_panel() {
        let mut canvas = Canvas::new(40, 30, [0, 0, 0]);
        canvas
            .paint_plot(Rect::new(10, 10, 20, 10), [200, 100, 50], |_area| Ok(()))
            .unwrap();
        assert_eq!(*canvas.image().get_pixel(15, 15), Rgb([200, 100, 50]));
        assert_eq!(*canvas.image().get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_blit_clips() {
        let mut canvas = Canvas::new(10, 10, [0, 0, 0]);
        let source = RgbImage::from_pixel(8, 8, Rgb([7, 7, 7]));
        canvas.blit(&source, 6, 6);
        assert_eq!(*canvas.image().get_pixel(9, 9), Rgb([7, 7, 7]));
        assert_eq!(*canvas.image().get_pixel(5, 5), Rgb([0, 0, 0]));
    }
}
