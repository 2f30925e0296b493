//! Render the interactive view to a PNG.

use std::path::PathBuf;

use anyhow::Context;

use sizesnapper_common::config::AppConfig;
use sizesnapper_render_engine::encode_png;

use super::{open_session, resolve_image, Store};

/// Parse `WIDTHxHEIGHT`.
pub fn parse_container(text: &str) -> anyhow::Result<(f64, f64)> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("Container must look like 1280x800, got '{text}'"))?;
    let w: f64 = w.trim().parse().with_context(|| format!("Bad container width '{w}'"))?;
    let h: f64 = h.trim().parse().with_context(|| format!("Bad container height '{h}'"))?;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        anyhow::bail!("Container dimensions must be positive, got '{text}'");
    }
    Ok((w, h))
}

pub async fn run(
    store: &Store,
    config: &AppConfig,
    needle: &str,
    output: PathBuf,
    select: Option<String>,
    container: Option<String>,
) -> anyhow::Result<()> {
    let mut session = open_session(store, config, needle).await?;

    if let Some(image) = select {
        let id = resolve_image(session.layers(), &image)?.id.clone();
        session.select(Some(&id))?;
    }
    if let Some(text) = container {
        let (w, h) = parse_container(&text)?;
        let scale = session.fit_container(w, h);
        tracing::debug!(display_scale = scale, "Fitted preview to container");
    }

    let pixmap = session.render_screen()?;
    let png = encode_png(&pixmap)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, png).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote preview {} ({}x{}, display scale {:.3})",
        output.display(),
        pixmap.width(),
        pixmap.height(),
        session.layout().display_scale
    );
    session.close();
    Ok(())
}
