//! SizeSnapper Store
//!
//! The persistence collaborator the editor and CLI talk to. A store is
//! opened once, injected wherever records are needed, and closed
//! explicitly; calls made after [`ProjectStore::close`] fail with
//! [`SnapperError::StoreClosed`](sizesnapper_common::error::SnapperError::StoreClosed).
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: process-local maps, used by tests and previews
//! - [`FileStore`]: JSON records plus raw blobs under a root directory
//!
//! Image bytes are opaque; no transcoding happens at storage time.

use async_trait::async_trait;

use sizesnapper_common::error::SnapperResult;
use sizesnapper_project_model::{ImageItem, Project, TransformUpdate};

pub mod fs;
pub mod memory;

pub use fs::FileStore;
pub use memory::MemoryStore;

/// CRUD surface for projects and their image layers.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a new project. The record must already be valid.
    async fn create_project(&self, project: &Project) -> SnapperResult<()>;

    /// Fetch one project, or `NotFound`.
    async fn get_project(&self, id: &str) -> SnapperResult<Project>;

    /// All projects, most recently updated first.
    async fn list_projects(&self) -> SnapperResult<Vec<Project>>;

    /// Replace an existing project record (rename/resize), or `NotFound`.
    async fn update_project(&self, project: &Project) -> SnapperResult<()>;

    /// Delete a project and every image it owns, or `NotFound`.
    async fn delete_project(&self, id: &str) -> SnapperResult<()>;

    /// Persist a new image layer. Its project must exist.
    async fn create_image(&self, image: &ImageItem) -> SnapperResult<()>;

    /// Fetch one image, or `NotFound`.
    async fn get_image(&self, id: &str) -> SnapperResult<ImageItem>;

    /// Images of a project in ascending z-order.
    async fn list_images(&self, project_id: &str) -> SnapperResult<Vec<ImageItem>>;

    /// Update only `x`/`y`/`scale` of an image; everything else is preserved.
    async fn patch_transform(&self, id: &str, update: &TransformUpdate) -> SnapperResult<()>;

    /// Delete one image, or `NotFound`.
    async fn delete_image(&self, id: &str) -> SnapperResult<()>;

    /// Release the store. Later calls fail with `StoreClosed`.
    async fn close(&self) -> SnapperResult<()>;

    /// Whether the store still accepts calls.
    fn is_open(&self) -> bool;
}

/// Sort order used by [`ProjectStore::list_projects`].
pub(crate) fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Sort order used by [`ProjectStore::list_images`].
pub(crate) fn sort_images(images: &mut [ImageItem]) {
    images.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
