//! SizeSnapper Project Model
//!
//! Defines the core data contracts for SizeSnapper projects:
//! - **Project:** a named canvas of fixed pixel dimensions
//! - **Image:** one uploaded raster layer with position, scale, and paint order
//! - **Geometry:** bounding boxes, containment, and partial transform updates
//!
//! All layer coordinates are in canvas-space pixels: `(0, 0)` is the
//! canvas's top-left corner, and values outside the canvas are legal.

pub mod geometry;
pub mod image;
pub mod project;

pub use geometry::*;
pub use image::*;
pub use project::*;
