//! Canvas compositor: paints positioned layers into a raster surface.
//!
//! One algorithm serves both the interactive preview and file export. The
//! difference is entirely in [`RenderOptions`]:
//!
//! ```text
//! interactive (padding > 0)              export (padding = 0)
//! ─────────────────────────              ────────────────────
//! 1. neutral background                  transparent surface
//! 2. checkerboard on the canvas rect
//! 3. unselected layers, canvas clip      every layer, canvas clip
//! 4. selected overflow, dimmed,
//!    padding-only clip
//! 5. selected in-bounds, canvas clip
//! 6. dashed selection outline
//! 7. 1px canvas border
//! ```
//!
//! The order above is load-bearing: swapping any two interactive steps
//! changes the visible output.

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap, PixmapPaint,
    Rect, Stroke, StrokeDash, Transform,
};

use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::ImageItem;

use crate::raster::Raster;

/// Colors and metrics of the interactive decorations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasStyle {
    /// Fill of the padded area around the canvas.
    pub background: Color,
    /// Checkerboard tone where `(col + row) % 2 == 0`.
    pub checker_light: Color,
    /// Checkerboard tone where `(col + row) % 2 == 1`.
    pub checker_dark: Color,
    /// Checkerboard cell size in canvas pixels.
    pub grid_size: u32,
    /// Opacity of the selected layer outside the canvas.
    pub overflow_opacity: f32,
    pub selection_color: Color,
    /// On-screen width of the selection outline.
    pub selection_line_width: f32,
    /// On-screen dash/gap lengths of the selection outline.
    pub selection_dash: [f32; 2],
    pub border_color: Color,
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            background: Color::from_rgba8(0xd4, 0xd4, 0xd8, 0xff),
            checker_light: Color::from_rgba8(0xf0, 0xf0, 0xf0, 0xff),
            checker_dark: Color::from_rgba8(0xe0, 0xe0, 0xe0, 0xff),
            grid_size: 20,
            overflow_opacity: 0.35,
            selection_color: Color::from_rgba8(0x3b, 0x82, 0xf6, 0xff),
            selection_line_width: 2.0,
            selection_dash: [6.0, 4.0],
            border_color: Color::from_rgba8(0xa1, 0xa1, 0xaa, 0xff),
        }
    }
}

/// Parameters that select between preview and export rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Space around the canvas, in canvas pixels, where overflow shows.
    pub viewport_padding: u32,
    /// Dim overflow and outline the selected layer.
    pub highlight_selection: bool,
    /// Paint background, checkerboard, and canvas border.
    pub decorations: bool,
    /// Factor by which the surface is shown on screen; strokes are
    /// divided by it so they look the same at every zoom.
    pub display_scale: f32,
    pub style: CanvasStyle,
}

impl RenderOptions {
    /// Live preview with overflow area and selection feedback.
    pub fn interactive(viewport_padding: u32, display_scale: f32) -> Self {
        Self {
            viewport_padding,
            highlight_selection: true,
            decorations: true,
            display_scale,
            style: CanvasStyle::default(),
        }
    }

    /// Clean canvas-sized output at 1:1.
    pub fn export() -> Self {
        Self {
            viewport_padding: 0,
            highlight_selection: false,
            decorations: false,
            display_scale: 1.0,
            style: CanvasStyle::default(),
        }
    }

    fn effective_display_scale(&self) -> f32 {
        if self.display_scale.is_finite() && self.display_scale > 0.0 {
            self.display_scale
        } else {
            1.0
        }
    }
}

/// A layer to paint, paired with its decoded raster.
///
/// `raster: None` marks a layer whose bytes failed to decode; it is skipped.
#[derive(Debug, Clone, Copy)]
pub struct RenderLayer<'a> {
    pub image: &'a ImageItem,
    pub raster: Option<&'a Raster>,
}

impl<'a> RenderLayer<'a> {
    pub fn new(image: &'a ImageItem, raster: Option<&'a Raster>) -> Self {
        Self { image, raster }
    }
}

/// Drawable surface size for a canvas with the given padding.
pub fn surface_size(canvas_width: u32, canvas_height: u32, padding: u32) -> (u32, u32) {
    (
        canvas_width.saturating_add(padding.saturating_mul(2)),
        canvas_height.saturating_add(padding.saturating_mul(2)),
    )
}

/// Allocate a correctly sized surface and render into it.
pub fn render_to_pixmap(
    canvas_width: u32,
    canvas_height: u32,
    layers: &[RenderLayer<'_>],
    selected_id: Option<&str>,
    options: &RenderOptions,
) -> SnapperResult<Pixmap> {
    let (w, h) = surface_size(canvas_width, canvas_height, options.viewport_padding);
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| SnapperError::render(format!("cannot allocate {w}x{h} surface")))?;
    render(
        &mut pixmap,
        canvas_width,
        canvas_height,
        layers,
        selected_id,
        options,
    )?;
    Ok(pixmap)
}

/// Paint `layers` into `target`.
///
/// `target` must be exactly [`surface_size`] for the options' padding.
/// Layers are painted in ascending `order` whatever their slice order.
pub fn render(
    target: &mut Pixmap,
    canvas_width: u32,
    canvas_height: u32,
    layers: &[RenderLayer<'_>],
    selected_id: Option<&str>,
    options: &RenderOptions,
) -> SnapperResult<()> {
    let padding = options.viewport_padding;
    let (full_w, full_h) = surface_size(canvas_width, canvas_height, padding);
    if target.width() != full_w || target.height() != full_h {
        return Err(SnapperError::render(format!(
            "surface is {}x{}, expected {full_w}x{full_h}",
            target.width(),
            target.height()
        )));
    }

    let pad = padding as f32;
    let canvas_rect = Rect::from_xywh(pad, pad, canvas_width as f32, canvas_height as f32)
        .ok_or_else(|| {
            SnapperError::render(format!(
                "invalid canvas {canvas_width}x{canvas_height}"
            ))
        })?;
    let canvas_clip = canvas_mask(full_w, full_h, canvas_rect, padding)?;
    let style = &options.style;

    if options.decorations {
        target.fill(style.background);
        draw_checkerboard(target, canvas_rect, style);
    } else {
        target.fill(Color::TRANSPARENT);
    }

    let mut ordered: Vec<&RenderLayer<'_>> = Vec::with_capacity(layers.len());
    for layer in layers {
        if layer.raster.is_some() {
            ordered.push(layer);
        } else {
            tracing::trace!(image = %layer.image.id, "Skipping layer without raster");
        }
    }
    ordered.sort_by_key(|layer| layer.image.order);

    let selected = if options.highlight_selection {
        selected_id.and_then(|id| ordered.iter().copied().find(|l| l.image.id == id))
    } else {
        None
    };

    for layer in &ordered {
        if selected.is_some_and(|s| s.image.id == layer.image.id) {
            continue;
        }
        draw_layer(target, layer, pad, 1.0, canvas_clip.as_ref());
    }

    if let Some(layer) = selected {
        if let Some(overflow_clip) = overflow_mask(full_w, full_h, canvas_rect, padding)? {
            draw_layer(target, layer, pad, style.overflow_opacity, Some(&overflow_clip));
        }
        draw_layer(target, layer, pad, 1.0, canvas_clip.as_ref());
        stroke_selection(target, layer, pad, options);
    }

    if options.decorations {
        stroke_canvas_border(target, canvas_rect, style);
    }

    Ok(())
}

/// Resample a rendered surface by `factor`, the way a host showing it at
/// that display scale would.
pub fn scale_surface(source: &Pixmap, factor: f32) -> SnapperResult<Pixmap> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(SnapperError::render(format!("invalid surface scale {factor}")));
    }
    let w = ((source.width() as f32 * factor).round() as u32).max(1);
    let h = ((source.height() as f32 * factor).round() as u32).max(1);
    let mut out = Pixmap::new(w, h)
        .ok_or_else(|| SnapperError::render(format!("cannot allocate {w}x{h} surface")))?;
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &paint,
        Transform::from_scale(factor, factor),
        None,
    );
    Ok(out)
}

/// Clip to the canvas rectangle; `None` when the canvas is the whole surface.
fn canvas_mask(
    full_w: u32,
    full_h: u32,
    canvas_rect: Rect,
    padding: u32,
) -> SnapperResult<Option<Mask>> {
    if padding == 0 {
        return Ok(None);
    }
    let mut mask = new_mask(full_w, full_h)?;
    let path = PathBuilder::from_rect(canvas_rect);
    mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    Ok(Some(mask))
}

/// Clip to the padding ring around the canvas; `None` without padding.
fn overflow_mask(
    full_w: u32,
    full_h: u32,
    canvas_rect: Rect,
    padding: u32,
) -> SnapperResult<Option<Mask>> {
    if padding == 0 {
        return Ok(None);
    }
    let pad = padding as f32;
    let (fw, fh) = (full_w as f32, full_h as f32);
    let mut pb = PathBuilder::new();
    let bands = [
        Rect::from_xywh(0.0, 0.0, pad, fh),
        Rect::from_xywh(canvas_rect.right(), 0.0, pad, fh),
        Rect::from_xywh(pad, 0.0, canvas_rect.width(), pad),
        Rect::from_xywh(pad, canvas_rect.bottom(), canvas_rect.width(), pad),
    ];
    for band in bands.into_iter().flatten() {
        pb.push_rect(band);
    }
    let Some(path) = pb.finish() else {
        return Ok(None);
    };
    let mut mask = new_mask(full_w, full_h)?;
    mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    Ok(Some(mask))
}

fn new_mask(width: u32, height: u32) -> SnapperResult<Mask> {
    Mask::new(width, height)
        .ok_or_else(|| SnapperError::render(format!("cannot allocate {width}x{height} mask")))
}

fn draw_checkerboard(target: &mut Pixmap, canvas_rect: Rect, style: &CanvasStyle) {
    let grid = style.grid_size.max(1) as f32;

    // Light everywhere, then dark cells on top.
    let mut paint = solid_paint(style.checker_light, false);
    target.fill_rect(canvas_rect, &paint, Transform::identity(), None);

    paint.set_color(style.checker_dark);
    let cols = (canvas_rect.width() / grid).ceil() as u32;
    let rows = (canvas_rect.height() / grid).ceil() as u32;
    for row in 0..rows {
        for col in 0..cols {
            if (col + row) % 2 == 0 {
                continue;
            }
            let x = col as f32 * grid;
            let y = row as f32 * grid;
            let w = grid.min(canvas_rect.width() - x);
            let h = grid.min(canvas_rect.height() - y);
            if let Some(cell) = Rect::from_xywh(canvas_rect.x() + x, canvas_rect.y() + y, w, h) {
                target.fill_rect(cell, &paint, Transform::identity(), None);
            }
        }
    }
}

fn draw_layer(target: &mut Pixmap, layer: &RenderLayer<'_>, pad: f32, opacity: f32, clip: Option<&Mask>) {
    let Some(raster) = layer.raster else {
        return;
    };
    let t = &layer.image.transform;
    let scale = t.scale as f32;
    if !(scale.is_finite() && scale > 0.0) {
        tracing::debug!(image = %layer.image.id, scale = t.scale, "Skipping layer with unusable scale");
        return;
    }
    let tx = pad + t.x as f32;
    let ty = pad + t.y as f32;

    // Unscaled, pixel-aligned layers are copied exactly.
    let quality = if scale == 1.0 && tx.fract() == 0.0 && ty.fract() == 0.0 {
        FilterQuality::Nearest
    } else {
        FilterQuality::Bilinear
    };
    let paint = PixmapPaint {
        opacity,
        blend_mode: BlendMode::SourceOver,
        quality,
    };
    let transform = Transform::from_row(scale, 0.0, 0.0, scale, tx, ty);
    target.draw_pixmap(0, 0, raster.pixmap(), &paint, transform, clip);
}

fn stroke_selection(target: &mut Pixmap, layer: &RenderLayer<'_>, pad: f32, options: &RenderOptions) {
    let Some(raster) = layer.raster else {
        return;
    };
    let t = &layer.image.transform;
    let w = raster.width() as f32 * t.scale as f32;
    let h = raster.height() as f32 * t.scale as f32;
    let Some(rect) = Rect::from_xywh(pad + t.x as f32, pad + t.y as f32, w, h) else {
        return;
    };

    let style = &options.style;
    let ds = options.effective_display_scale();
    let stroke = Stroke {
        width: style.selection_line_width / ds,
        dash: StrokeDash::new(
            vec![style.selection_dash[0] / ds, style.selection_dash[1] / ds],
            0.0,
        ),
        ..Stroke::default()
    };
    let paint = solid_paint(style.selection_color, true);
    let path = PathBuilder::from_rect(rect);
    target.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn stroke_canvas_border(target: &mut Pixmap, canvas_rect: Rect, style: &CanvasStyle) {
    // Half-pixel outset puts a crisp 1px line just outside the canvas.
    let Some(rect) = Rect::from_xywh(
        canvas_rect.x() - 0.5,
        canvas_rect.y() - 0.5,
        canvas_rect.width() + 1.0,
        canvas_rect.height() + 1.0,
    ) else {
        return;
    };
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    let paint = solid_paint(style.border_color, true);
    let path = PathBuilder::from_rect(rect);
    target.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn solid_paint(color: Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = anti_alias;
    paint
}
