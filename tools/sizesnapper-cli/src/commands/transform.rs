//! Change a layer's placement the way the interactive editor would.

use sizesnapper_common::config::AppConfig;
use sizesnapper_editor::{Key, LayerSizes, PointerEvent};
use sizesnapper_project_model::{bounding_box, Point, TransformUpdate};

use super::{open_session, resolve_image, Store};

/// Edits requested on the command line, applied in field order.
#[derive(Debug, Default)]
pub struct Edits {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub scale: Option<String>,
    pub drag: Option<(f64, f64)>,
    pub nudge: Vec<String>,
}

impl Edits {
    fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.scale.is_none()
            && self.drag.is_none()
            && self.nudge.is_empty()
    }
}

pub async fn run(
    store: &Store,
    config: &AppConfig,
    needle: &str,
    image: &str,
    edits: Edits,
) -> anyhow::Result<()> {
    let mut session = open_session(store, config, needle).await?;
    let id = resolve_image(session.layers(), image)?.id.clone();
    session.select(Some(&id))?;

    if edits.x.is_some() || edits.y.is_some() {
        let update = TransformUpdate {
            x: edits.x,
            y: edits.y,
            scale: None,
        };
        session.update_transform(&id, update)?;
    }

    if let Some(text) = &edits.scale {
        session.set_scale_text(text)?;
    }

    if let Some((dx, dy)) = edits.drag {
        let natural = session
            .rasters()
            .natural_size(&id)
            .ok_or_else(|| anyhow::anyhow!("Cannot drag a layer that could not be decoded"))?;
        let layer = session
            .layer(&id)
            .ok_or_else(|| anyhow::anyhow!("Layer disappeared during edit"))?;
        let bounds = bounding_box(layer, natural);
        let grab = Point::new(bounds.x + bounds.w / 2.0, bounds.y + bounds.h / 2.0);
        let layout = *session.layout();

        session.pointer(PointerEvent::Down(layout.canvas_to_screen(grab)))?;
        session.pointer(PointerEvent::Move(
            layout.canvas_to_screen(Point::new(grab.x + dx, grab.y + dy)),
        ))?;
        session.pointer(PointerEvent::Up)?;
    }

    for name in &edits.nudge {
        let key = Key::from_name(name);
        if matches!(key, Key::Other(_)) {
            anyhow::bail!("Unknown nudge direction '{name}' (expected left, right, up, or down)");
        }
        session.key(&key)?;
    }

    if !edits.is_empty() {
        let written = session.flush().await;
        tracing::debug!(image = %id, written, "Flushed transform edits");
        if let Some(failure) = session.drain_failures().into_iter().next() {
            anyhow::bail!("Failed to save transform for {}: {}", failure.image_id, failure.message);
        }
    }

    let layer = session
        .layer(&id)
        .ok_or_else(|| anyhow::anyhow!("Layer disappeared during edit"))?;
    println!(
        "{}: x={} y={} scale={} ({}%)",
        layer.file_name,
        layer.x(),
        layer.y(),
        layer.scale(),
        session.selected_scale_percent().unwrap_or(100)
    );

    session.close();
    Ok(())
}
