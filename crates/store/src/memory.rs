//! In-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use sizesnapper_common::clock::now_millis;
use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::{ImageItem, Project, TransformUpdate};

use crate::{sort_images, sort_projects, ProjectStore};

#[derive(Default)]
struct Tables {
    projects: HashMap<String, Project>,
    images: HashMap<String, ImageItem>,
}

/// A store that keeps every record in process memory.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    open: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            open: AtomicBool::new(true),
        }
    }

    fn ensure_open(&self) -> SnapperResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SnapperError::StoreClosed)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, project: &Project) -> SnapperResult<()> {
        self.ensure_open()?;
        project.validate()?;
        let mut tables = self.tables.write().await;
        if tables.projects.contains_key(&project.id) {
            return Err(SnapperError::store(format!(
                "project {} already exists",
                project.id
            )));
        }
        tables.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &str) -> SnapperResult<Project> {
        self.ensure_open()?;
        self.tables
            .read()
            .await
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| SnapperError::project_not_found(id))
    }

    async fn list_projects(&self) -> SnapperResult<Vec<Project>> {
        self.ensure_open()?;
        let mut projects: Vec<Project> =
            self.tables.read().await.projects.values().cloned().collect();
        sort_projects(&mut projects);
        Ok(projects)
    }

    async fn update_project(&self, project: &Project) -> SnapperResult<()> {
        self.ensure_open()?;
        project.validate()?;
        let mut tables = self.tables.write().await;
        match tables.projects.get_mut(&project.id) {
            Some(existing) => {
                *existing = project.clone();
                Ok(())
            }
            None => Err(SnapperError::project_not_found(&project.id)),
        }
    }

    async fn delete_project(&self, id: &str) -> SnapperResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        if tables.projects.remove(id).is_none() {
            return Err(SnapperError::project_not_found(id));
        }
        let before = tables.images.len();
        tables.images.retain(|_, image| image.project_id != id);
        tracing::debug!(
            project = id,
            images_removed = before - tables.images.len(),
            "Deleted project"
        );
        Ok(())
    }

    async fn create_image(&self, image: &ImageItem) -> SnapperResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&image.project_id) {
            return Err(SnapperError::project_not_found(&image.project_id));
        }
        if tables.images.contains_key(&image.id) {
            return Err(SnapperError::store(format!(
                "image {} already exists",
                image.id
            )));
        }
        tables.images.insert(image.id.clone(), image.clone());
        if let Some(project) = tables.projects.get_mut(&image.project_id) {
            project.updated_at = now_millis().max(project.updated_at);
        }
        Ok(())
    }

    async fn get_image(&self, id: &str) -> SnapperResult<ImageItem> {
        self.ensure_open()?;
        self.tables
            .read()
            .await
            .images
            .get(id)
            .cloned()
            .ok_or_else(|| SnapperError::image_not_found(id))
    }

    async fn list_images(&self, project_id: &str) -> SnapperResult<Vec<ImageItem>> {
        self.ensure_open()?;
        let mut images: Vec<ImageItem> = self
            .tables
            .read()
            .await
            .images
            .values()
            .filter(|image| image.project_id == project_id)
            .cloned()
            .collect();
        sort_images(&mut images);
        Ok(images)
    }

    async fn patch_transform(&self, id: &str, update: &TransformUpdate) -> SnapperResult<()> {
        self.ensure_open()?;
        update.validate()?;
        let mut tables = self.tables.write().await;
        let image = tables
            .images
            .get_mut(id)
            .ok_or_else(|| SnapperError::image_not_found(id))?;
        image.transform = image.transform.updated(update);
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> SnapperResult<()> {
        self.ensure_open()?;
        let mut tables = self.tables.write().await;
        tables
            .images
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SnapperError::image_not_found(id))
    }

    async fn close(&self) -> SnapperResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
