//! On-disk store.
//!
//! Layout under the store root:
//!
//! ```text
//! root/
//! ├── projects/<id>.json   (project records)
//! └── images/
//!     ├── <id>.json        (layer metadata and transform)
//!     └── <id>.bin         (raw uploaded bytes)
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place so
//! a crash never leaves a half-written record behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use sizesnapper_common::clock::{now_millis, EpochMillis};
use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::{ImageItem, Project, Transform, TransformUpdate};

use crate::{sort_images, sort_projects, ProjectStore};

const PROJECTS_DIR: &str = "projects";
const IMAGES_DIR: &str = "images";

/// Image metadata as written to `images/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageRecord {
    id: String,
    project_id: String,
    file_name: String,
    mime_type: String,
    transform: Transform,
    order: u32,
    created_at: EpochMillis,
    /// Length of the companion blob, checked on load.
    byte_len: u64,
}

impl ImageRecord {
    fn from_item(image: &ImageItem) -> Self {
        Self {
            id: image.id.clone(),
            project_id: image.project_id.clone(),
            file_name: image.file_name.clone(),
            mime_type: image.mime_type.clone(),
            transform: image.transform,
            order: image.order,
            created_at: image.created_at,
            byte_len: image.data.len() as u64,
        }
    }

    fn into_item(self, data: Vec<u8>) -> ImageItem {
        ImageItem {
            id: self.id,
            project_id: self.project_id,
            file_name: self.file_name,
            data: data.into(),
            mime_type: self.mime_type,
            transform: self.transform,
            order: self.order,
            created_at: self.created_at,
        }
    }
}

/// A store backed by a directory of JSON records and blobs.
pub struct FileStore {
    root: PathBuf,
    /// Serializes mutations so read-modify-write cycles stay atomic.
    write_lock: Mutex<()>,
    open: AtomicBool,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> SnapperResult<Self> {
        let root = root.as_ref().to_path_buf();
        for subdir in [PROJECTS_DIR, IMAGES_DIR] {
            tokio::fs::create_dir_all(root.join(subdir)).await?;
        }
        tracing::debug!(root = %root.display(), "Opened file store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            open: AtomicBool::new(true),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> SnapperResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SnapperError::StoreClosed)
        }
    }

    fn project_path(&self, id: &str) -> Option<PathBuf> {
        is_safe_id(id).then(|| self.root.join(PROJECTS_DIR).join(format!("{id}.json")))
    }

    fn image_meta_path(&self, id: &str) -> Option<PathBuf> {
        is_safe_id(id).then(|| self.root.join(IMAGES_DIR).join(format!("{id}.json")))
    }

    fn image_blob_path(&self, id: &str) -> Option<PathBuf> {
        is_safe_id(id).then(|| self.root.join(IMAGES_DIR).join(format!("{id}.bin")))
    }

    async fn read_project(&self, id: &str) -> SnapperResult<Project> {
        let path = self
            .project_path(id)
            .ok_or_else(|| SnapperError::project_not_found(id))?;
        match read_json::<Project>(&path).await? {
            Some(project) => Ok(project),
            None => Err(SnapperError::project_not_found(id)),
        }
    }

    async fn read_image_record(&self, id: &str) -> SnapperResult<ImageRecord> {
        let path = self
            .image_meta_path(id)
            .ok_or_else(|| SnapperError::image_not_found(id))?;
        match read_json::<ImageRecord>(&path).await? {
            Some(record) => Ok(record),
            None => Err(SnapperError::image_not_found(id)),
        }
    }

    async fn load_image(&self, record: ImageRecord) -> SnapperResult<ImageItem> {
        let blob_path = self
            .image_blob_path(&record.id)
            .ok_or_else(|| SnapperError::image_not_found(&record.id))?;
        let data = tokio::fs::read(&blob_path).await.map_err(|e| {
            SnapperError::store(format!("missing blob {}: {e}", blob_path.display()))
        })?;
        if data.len() as u64 != record.byte_len {
            return Err(SnapperError::store(format!(
                "blob for image {} has {} bytes, expected {}",
                record.id,
                data.len(),
                record.byte_len
            )));
        }
        Ok(record.into_item(data))
    }

    async fn all_image_records(&self) -> SnapperResult<Vec<ImageRecord>> {
        let mut records = Vec::new();
        for path in json_files(&self.root.join(IMAGES_DIR)).await? {
            match read_json::<ImageRecord>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable image record"),
            }
        }
        Ok(records)
    }

    async fn remove_image_files(&self, id: &str) -> SnapperResult<()> {
        if let Some(path) = self.image_meta_path(id) {
            remove_if_exists(&path).await?;
        }
        if let Some(path) = self.image_blob_path(id) {
            remove_if_exists(&path).await?;
        }
        Ok(())
    }

    async fn touch_project(&self, id: &str) -> SnapperResult<()> {
        let mut project = self.read_project(id).await?;
        project.updated_at = now_millis().max(project.updated_at);
        write_json(&self.project_path_checked(id)?, &project).await
    }

    fn project_path_checked(&self, id: &str) -> SnapperResult<PathBuf> {
        self.project_path(id)
            .ok_or_else(|| SnapperError::validation(format!("invalid project id: {id:?}")))
    }

    fn image_paths_checked(&self, id: &str) -> SnapperResult<(PathBuf, PathBuf)> {
        match (self.image_meta_path(id), self.image_blob_path(id)) {
            (Some(meta), Some(blob)) => Ok((meta, blob)),
            _ => Err(SnapperError::validation(format!("invalid image id: {id:?}"))),
        }
    }
}

#[async_trait]
impl ProjectStore for FileStore {
    async fn create_project(&self, project: &Project) -> SnapperResult<()> {
        self.ensure_open()?;
        project.validate()?;
        let path = self.project_path_checked(&project.id)?;
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(&path).await? {
            return Err(SnapperError::store(format!(
                "project {} already exists",
                project.id
            )));
        }
        write_json(&path, project).await?;
        tracing::debug!(project = %project.id, name = %project.name, "Created project");
        Ok(())
    }

    async fn get_project(&self, id: &str) -> SnapperResult<Project> {
        self.ensure_open()?;
        self.read_project(id).await
    }

    async fn list_projects(&self) -> SnapperResult<Vec<Project>> {
        self.ensure_open()?;
        let mut projects = Vec::new();
        for path in json_files(&self.root.join(PROJECTS_DIR)).await? {
            match read_json::<Project>(&path).await {
                Ok(Some(project)) => projects.push(project),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable project record"),
            }
        }
        sort_projects(&mut projects);
        Ok(projects)
    }

    async fn update_project(&self, project: &Project) -> SnapperResult<()> {
        self.ensure_open()?;
        project.validate()?;
        let _guard = self.write_lock.lock().await;
        // Existence check doubles as id validation.
        self.read_project(&project.id).await?;
        write_json(&self.project_path_checked(&project.id)?, project).await
    }

    async fn delete_project(&self, id: &str) -> SnapperResult<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        self.read_project(id).await?;

        let owned: Vec<String> = self
            .all_image_records()
            .await?
            .into_iter()
            .filter(|record| record.project_id == id)
            .map(|record| record.id)
            .collect();
        for image_id in &owned {
            self.remove_image_files(image_id).await?;
        }
        remove_if_exists(&self.project_path_checked(id)?).await?;

        tracing::debug!(project = id, images_removed = owned.len(), "Deleted project");
        Ok(())
    }

    async fn create_image(&self, image: &ImageItem) -> SnapperResult<()> {
        self.ensure_open()?;
        let (meta_path, blob_path) = self.image_paths_checked(&image.id)?;
        let _guard = self.write_lock.lock().await;
        self.read_project(&image.project_id).await?;
        if tokio::fs::try_exists(&meta_path).await? {
            return Err(SnapperError::store(format!(
                "image {} already exists",
                image.id
            )));
        }

        // Blob first: a record never points at a missing blob.
        write_atomic(&blob_path, &image.data).await?;
        write_json(&meta_path, &ImageRecord::from_item(image)).await?;
        self.touch_project(&image.project_id).await?;

        tracing::debug!(
            image = %image.id,
            project = %image.project_id,
            bytes = image.data.len(),
            "Stored image"
        );
        Ok(())
    }

    async fn get_image(&self, id: &str) -> SnapperResult<ImageItem> {
        self.ensure_open()?;
        let record = self.read_image_record(id).await?;
        self.load_image(record).await
    }

    async fn list_images(&self, project_id: &str) -> SnapperResult<Vec<ImageItem>> {
        self.ensure_open()?;
        let mut images = Vec::new();
        for record in self.all_image_records().await? {
            if record.project_id == project_id {
                images.push(self.load_image(record).await?);
            }
        }
        sort_images(&mut images);
        Ok(images)
    }

    async fn patch_transform(&self, id: &str, update: &TransformUpdate) -> SnapperResult<()> {
        self.ensure_open()?;
        update.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_image_record(id).await?;
        record.transform = record.transform.updated(update);
        let (meta_path, _) = self.image_paths_checked(id)?;
        write_json(&meta_path, &record).await
    }

    async fn delete_image(&self, id: &str) -> SnapperResult<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        self.read_image_record(id).await?;
        self.remove_image_files(id).await
    }

    async fn close(&self) -> SnapperResult<()> {
        // Waits for an in-flight mutation to finish before refusing new ones.
        let _guard = self.write_lock.lock().await;
        self.open.store(false, Ordering::Release);
        tracing::debug!(root = %self.root.display(), "Closed file store");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Ids become file names, so only UUID-like characters are accepted.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn json_files(dir: &Path) -> SnapperResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(files)
}

/// Read and parse a JSON file; `Ok(None)` when it does not exist.
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> SnapperResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> SnapperResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json).await
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> SnapperResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> SnapperResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
