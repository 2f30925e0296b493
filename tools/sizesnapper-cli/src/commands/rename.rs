//! Rename or resize a project.

use sizesnapper_common::error::SnapperError;

use super::{resolve_project, Store};

pub async fn run(store: &Store, needle: &str, name: String) -> anyhow::Result<()> {
    let mut project = resolve_project(store, needle).await?;
    let old = project.name.clone();
    project.rename(name).map_err(SnapperError::from)?;
    store.update_project(&project).await?;

    println!("Renamed '{}' to '{}'", old, project.name);
    Ok(())
}

pub async fn resize(store: &Store, needle: &str, width: u32, height: u32) -> anyhow::Result<()> {
    let mut project = resolve_project(store, needle).await?;
    let (old_w, old_h) = (project.canvas_width, project.canvas_height);
    project.resize(width, height).map_err(SnapperError::from)?;
    store.update_project(&project).await?;

    println!(
        "Resized '{}' from {}x{} to {}x{}",
        project.name, old_w, old_h, project.canvas_width, project.canvas_height
    );
    println!("Layer positions are unchanged; check overflow with `sizesnapper info`.");
    Ok(())
}
