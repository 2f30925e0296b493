//! Canvas geometry: points, sizes, rectangles, and layer bounds.
//!
//! All coordinates are canvas-space pixels. `(0, 0)` is the top-left of
//! the project canvas; negative values and values past the canvas edge
//! describe overflow and are legal.

use serde::{Deserialize, Serialize};

use crate::image::{ImageItem, TransformUpdate};

/// A canvas-space point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`.
    pub fn delta_from(&self, other: &Point) -> Point {
        Point {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Round both components to whole pixels.
    pub fn round(&self) -> Point {
        Point {
            x: self.x.round(),
            y: self.y.round(),
        }
    }
}

/// Natural pixel dimensions of a decoded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// The canvas rectangle of a project.
    pub fn canvas(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f64, height as f64)
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    /// Inclusive containment: points on any edge count as inside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Overlapping area of two rectangles, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersection(other).is_some()
    }

    /// How far this rectangle sticks out past each edge of `bounds`.
    pub fn overflow_beyond(&self, bounds: &Rect) -> Overflow {
        Overflow {
            left: (bounds.x - self.x).max(0.0),
            top: (bounds.y - self.y).max(0.0),
            right: (self.right() - bounds.right()).max(0.0),
            bottom: (self.bottom() - bounds.bottom()).max(0.0),
        }
    }
}

/// Per-edge overflow distances in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Overflow {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Overflow {
    pub fn any(&self) -> bool {
        self.left > 0.0 || self.top > 0.0 || self.right > 0.0 || self.bottom > 0.0
    }
}

/// Rendered bounds of a layer: `[x, x + w·scale] × [y, y + h·scale]`.
pub fn bounding_box(image: &ImageItem, natural: Size) -> Rect {
    let t = &image.transform;
    Rect::new(
        t.x,
        t.y,
        natural.width as f64 * t.scale,
        natural.height as f64 * t.scale,
    )
}

/// Whether `point` falls inside the layer's bounds, edges included.
pub fn contains_point(image: &ImageItem, natural: Size, point: Point) -> bool {
    bounding_box(image, natural).contains(point)
}

/// Return a copy of `image` with only the provided transform fields changed.
///
/// No clamping or rounding happens here; callers own that policy.
pub fn apply_transform_delta(image: &ImageItem, update: &TransformUpdate) -> ImageItem {
    let mut next = image.clone();
    next.transform = image.transform.updated(update);
    next
}
