//! Upload image files as new layers.

use std::path::{Path, PathBuf};

use anyhow::Context;
use image::ImageFormat;

use sizesnapper_common::config::AppConfig;
use sizesnapper_project_model::NewImage;

use super::{open_session, short_id, Store};

/// MIME type guessed from the file extension; empty when unknown.
pub fn guess_mime_type(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("")
}

fn read_upload(path: &Path) -> anyhow::Result<NewImage> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(NewImage::new(file_name, data, guess_mime_type(path)))
}

pub async fn run(
    store: &Store,
    config: &AppConfig,
    needle: &str,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let uploads = files
        .iter()
        .map(|path| read_upload(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = open_session(store, config, needle).await?;
    let ids = session.add_images(uploads).await?;

    println!("Added {} image(s) to '{}':", ids.len(), session.project().name);
    for id in &ids {
        let Some(layer) = session.layer(id) else {
            continue;
        };
        match session.rasters().get(id) {
            Some(raster) => println!(
                "  [{}] {} {} ({}x{})",
                layer.order,
                short_id(id),
                layer.file_name,
                raster.width(),
                raster.height()
            ),
            None => println!(
                "  [{}] {} {} (could not be decoded; it will not render or export)",
                layer.order,
                short_id(id),
                layer.file_name
            ),
        }
    }

    session.close();
    Ok(())
}
