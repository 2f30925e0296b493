//! Create a new project.

use sizesnapper_common::clock::format_local;
use sizesnapper_common::error::SnapperError;
use sizesnapper_project_model::Project;

use super::Store;

pub async fn run(store: &Store, name: String, width: u32, height: u32) -> anyhow::Result<()> {
    let project = Project::new(name, width, height).map_err(SnapperError::from)?;
    store.create_project(&project).await?;

    println!("Created project '{}'", project.name);
    println!("  ID: {}", project.id);
    println!("  Canvas: {}x{}", project.canvas_width, project.canvas_height);
    println!("  Created: {}", format_local(project.created_at));
    Ok(())
}
