//! SizeSnapper Render Engine
//!
//! Turns a project's positioned layers into pixels. The same compositor
//! drives the padded interactive preview and the canvas-sized export.
//!
//! # Pipeline Architecture
//!
//! ```text
//! image bytes ──► raster::decode_raster ──► Raster (premultiplied)
//!                                              │
//! transforms ──────────────────────────────────┤
//!                                              ▼
//!                              compositor::render (preview | export)
//!                                              │
//!                             ┌────────────────┴──────────────┐
//!                             ▼                               ▼
//!                    preview surface             raster::encode_png
//!                                                             │
//!                                                             ▼
//!                                           export::ExportSink (file | bundle)
//! ```

pub mod compositor;
pub mod export;
pub mod raster;

pub use compositor::{
    render, render_to_pixmap, scale_surface, surface_size, CanvasStyle, RenderLayer, RenderOptions,
};
pub use export::*;
pub use raster::{decode_image, decode_raster, encode_png, Raster};
