//! List projects.

use sizesnapper_common::clock::format_local;

use super::{short_id, Store};

pub async fn run(store: &Store, json: bool) -> anyhow::Result<()> {
    let projects = store.list_projects().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects yet. Create one with `sizesnapper new <NAME>`.");
        return Ok(());
    }

    println!("{:<10} {:<28} {:>11} {:>7}  {}", "ID", "NAME", "CANVAS", "IMAGES", "UPDATED");
    for project in &projects {
        let images = store.list_images(&project.id).await?.len();
        println!(
            "{:<10} {:<28} {:>11} {:>7}  {}",
            short_id(&project.id),
            truncate(&project.name, 28),
            format!("{}x{}", project.canvas_width, project.canvas_height),
            images,
            format_local(project.updated_at)
        );
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
