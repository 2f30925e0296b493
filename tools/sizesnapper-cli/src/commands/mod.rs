pub mod add;
pub mod delete;
pub mod export;
pub mod info;
pub mod list;
pub mod new;
pub mod preview;
pub mod remove;
pub mod rename;
pub mod transform;

use std::sync::Arc;

use anyhow::Context;

use sizesnapper_common::config::AppConfig;
use sizesnapper_common::error::SnapperError;
use sizesnapper_editor::EditorSession;
use sizesnapper_project_model::{ImageItem, Project};
use sizesnapper_store::{FileStore, ProjectStore};

pub type Store = Arc<dyn ProjectStore>;

pub async fn open_store(config: &AppConfig) -> anyhow::Result<Store> {
    let store = FileStore::open(&config.store_dir)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store_dir.display()))?;
    tracing::debug!(root = %store.root().display(), "Opened store");
    let store: Store = Arc::new(store);
    Ok(store)
}

pub async fn close_store(store: &Store) -> anyhow::Result<()> {
    store.close().await?;
    Ok(())
}

/// Find a project by exact id, exact name, or unique id prefix.
pub async fn resolve_project(store: &Store, needle: &str) -> anyhow::Result<Project> {
    match store.get_project(needle).await {
        Ok(project) => return Ok(project),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let projects = store.list_projects().await?;
    let by_name: Vec<&Project> = projects.iter().filter(|p| p.name == needle).collect();
    let candidates = if by_name.is_empty() {
        projects.iter().filter(|p| p.id.starts_with(needle)).collect()
    } else {
        by_name
    };

    match candidates.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(SnapperError::project_not_found(needle).into()),
        many => anyhow::bail!(
            "'{needle}' matches {} projects; use a longer id prefix",
            many.len()
        ),
    }
}

/// Find a layer by exact id, unique id prefix, or unique file name.
pub fn resolve_image<'a>(layers: &'a [ImageItem], needle: &str) -> anyhow::Result<&'a ImageItem> {
    if let Some(exact) = layers.iter().find(|l| l.id == needle) {
        return Ok(exact);
    }
    let by_name: Vec<&ImageItem> = layers.iter().filter(|l| l.file_name == needle).collect();
    let candidates = if by_name.is_empty() {
        layers.iter().filter(|l| l.id.starts_with(needle)).collect()
    } else {
        by_name
    };

    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err(SnapperError::image_not_found(needle).into()),
        many => anyhow::bail!(
            "'{needle}' matches {} images; use the image id",
            many.len()
        ),
    }
}

/// Open an editor session for a project named on the command line.
pub async fn open_session(
    store: &Store,
    config: &AppConfig,
    needle: &str,
) -> anyhow::Result<EditorSession> {
    let project = resolve_project(store, needle).await?;
    let session = EditorSession::open(Arc::clone(store), &project.id, &config.editor).await?;
    Ok(session)
}

/// Short form of an id for tables.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizesnapper_project_model::NewImage;

    fn layer(name: &str) -> ImageItem {
        ImageItem::new("p", NewImage::new(name, vec![0u8], "image/png"), 0)
    }

    #[test]
    fn test_resolve_image_by_name_and_prefix() {
        let layers = vec![layer("a.png"), layer("b.png")];
        assert_eq!(resolve_image(&layers, "b.png").unwrap().id, layers[1].id);
        assert_eq!(resolve_image(&layers, &layers[0].id[..12]).unwrap().id, layers[0].id);

        let err = resolve_image(&layers, "c.png").unwrap_err();
        assert!(err
            .downcast_ref::<SnapperError>()
            .is_some_and(SnapperError::is_not_found));
    }

    #[test]
    fn test_duplicate_names_are_ambiguous() {
        let layers = vec![layer("same.png"), layer("same.png")];
        assert!(resolve_image(&layers, "same.png").is_err());
        assert_eq!(resolve_image(&layers, &layers[1].id).unwrap().id, layers[1].id);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[tokio::test]
    async fn test_resolve_project() {
        let store: Store = Arc::new(sizesnapper_store::MemoryStore::new());
        let project = Project::new("Poster", 10, 10).unwrap();
        store.create_project(&project).await.unwrap();

        assert_eq!(resolve_project(&store, "Poster").await.unwrap().id, project.id);
        assert_eq!(resolve_project(&store, &project.id[..6]).await.unwrap().id, project.id);
        let err = resolve_project(&store, "Nope").await.unwrap_err();
        assert!(err.downcast_ref::<SnapperError>().is_some_and(SnapperError::is_not_found));
    }
}
