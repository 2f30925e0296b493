//! Show project information.

use serde::Serialize;

use sizesnapper_common::clock::{format_local, format_rfc3339};
use sizesnapper_common::config::AppConfig;
use sizesnapper_editor::{EditorSession, LayerSizes};
use sizesnapper_project_model::{bounding_box, Overflow, Project, Rect};

use super::{open_session, Store};

#[derive(Debug, Serialize)]
struct ProjectReport<'a> {
    project: &'a Project,
    created: String,
    updated: String,
    layers: Vec<LayerReport<'a>>,
}

#[derive(Debug, Serialize)]
struct LayerReport<'a> {
    id: &'a str,
    file_name: &'a str,
    mime_type: &'a str,
    bytes: usize,
    order: u32,
    x: f64,
    y: f64,
    scale: f64,
    /// `None` when the bytes could not be decoded.
    natural_size: Option<(u32, u32)>,
    bounds: Option<Rect>,
    overflow: Option<Overflow>,
}

fn report(session: &EditorSession) -> ProjectReport<'_> {
    let project = session.project();
    let canvas = Rect::canvas(project.canvas_width, project.canvas_height);
    let layers = session
        .layers()
        .iter()
        .map(|layer| {
            let natural = session.rasters().natural_size(&layer.id);
            let bounds = natural.map(|size| bounding_box(layer, size));
            LayerReport {
                id: &layer.id,
                file_name: &layer.file_name,
                mime_type: &layer.mime_type,
                bytes: layer.data.len(),
                order: layer.order,
                x: layer.x(),
                y: layer.y(),
                scale: layer.scale(),
                natural_size: natural.map(|s| (s.width, s.height)),
                bounds,
                overflow: bounds.map(|b| b.overflow_beyond(&canvas)),
            }
        })
        .collect();
    ProjectReport {
        project,
        created: format_rfc3339(project.created_at),
        updated: format_rfc3339(project.updated_at),
        layers,
    }
}

pub async fn run(store: &Store, config: &AppConfig, needle: &str, json: bool) -> anyhow::Result<()> {
    let session = open_session(store, config, needle).await?;
    let report = report(&session);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        session.close();
        return Ok(());
    }

    let p = report.project;
    println!("Project: {}", p.name);
    println!("  ID: {}", p.id);
    println!("  Canvas: {}x{}", p.canvas_width, p.canvas_height);
    println!("  Created: {}", format_local(p.created_at));
    println!("  Modified: {}", format_local(p.updated_at));
    println!();

    if report.layers.is_empty() {
        println!("Layers: none");
    } else {
        println!("Layers (bottom to top):");
        for layer in &report.layers {
            println!("  [{}] {} ({}, {} bytes)", layer.order, layer.file_name, layer.mime_type, layer.bytes);
            println!("      ID: {}", layer.id);
            println!(
                "      Position: ({}, {})  Scale: {:.0}%",
                layer.x,
                layer.y,
                layer.scale * 100.0
            );
            match (layer.natural_size, layer.overflow) {
                (Some((w, h)), Some(overflow)) => {
                    println!("      Natural size: {w}x{h}");
                    if overflow.any() {
                        println!(
                            "      Overflow: left {} top {} right {} bottom {}",
                            overflow.left, overflow.top, overflow.right, overflow.bottom
                        );
                    }
                }
                _ => println!("      Could not be decoded; hidden in preview and export"),
            }
        }
    }

    session.close();
    Ok(())
}
