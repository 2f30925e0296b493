//! Delete a project.

use super::{resolve_project, Store};

pub async fn run(store: &Store, needle: &str) -> anyhow::Result<()> {
    let project = resolve_project(store, needle).await?;
    let images = store.list_images(&project.id).await?.len();
    store.delete_project(&project.id).await?;

    println!("Deleted project '{}' and {} image(s)", project.name, images);
    Ok(())
}
