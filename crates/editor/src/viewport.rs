//! Mapping between on-screen pointer positions and canvas space.
//!
//! The preview surface is the canvas plus `padding` on every side, shown at
//! `display_scale`. A pointer at screen `(sx, sy)` relative to the surface's
//! top-left lands on canvas point `(sx / ds - padding, sy / ds - padding)`.

use sizesnapper_project_model::Point;

/// Smallest display scale a degenerate container can produce.
pub const MIN_DISPLAY_SCALE: f64 = 1e-3;

/// Geometry of the interactive preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Space around the canvas in canvas pixels.
    pub padding: u32,
    /// Screen pixels per surface pixel. Never above 1.
    pub display_scale: f64,
}

impl ViewportLayout {
    /// Layout shown at 1:1.
    pub fn new(canvas_width: u32, canvas_height: u32, padding: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
            padding,
            display_scale: 1.0,
        }
    }

    /// Surface width including padding.
    pub fn full_width(&self) -> u32 {
        self.canvas_width.saturating_add(self.padding.saturating_mul(2))
    }

    /// Surface height including padding.
    pub fn full_height(&self) -> u32 {
        self.canvas_height.saturating_add(self.padding.saturating_mul(2))
    }

    /// Shrink to fit a container, keeping `margin` pixels free.
    ///
    /// Never scales up past 1:1.
    pub fn fit(&mut self, container_width: f64, container_height: f64, margin: f64) -> f64 {
        let full_w = self.full_width().max(1) as f64;
        let full_h = self.full_height().max(1) as f64;
        let sx = (container_width - margin) / full_w;
        let sy = (container_height - margin) / full_h;
        let scale = sx.min(sy).min(1.0);
        self.display_scale = if scale.is_finite() {
            scale.max(MIN_DISPLAY_SCALE)
        } else {
            1.0
        };
        self.display_scale
    }

    /// On-screen size of the preview surface.
    pub fn screen_size(&self) -> (f64, f64) {
        (
            self.full_width() as f64 * self.display_scale,
            self.full_height() as f64 * self.display_scale,
        )
    }

    /// Screen position (relative to the surface's top-left) to canvas space.
    ///
    /// The result may be negative or past the canvas edge.
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        let pad = self.padding as f64;
        Point::new(
            screen.x / self.display_scale - pad,
            screen.y / self.display_scale - pad,
        )
    }

    /// Inverse of [`screen_to_canvas`](Self::screen_to_canvas).
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        let pad = self.padding as f64;
        Point::new(
            (canvas.x + pad) * self.display_scale,
            (canvas.y + pad) * self.display_scale,
        )
    }
}
