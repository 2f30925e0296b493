//! Export pipeline: render layers at canvas size and hand PNGs to a sink.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::{ImageItem, Project};

use crate::compositor::{render_to_pixmap, RenderLayer, RenderOptions};
use crate::raster::{decode_image, encode_png, Raster};

/// What an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    /// One canvas-sized PNG per image, each rendered alone.
    #[default]
    EachImage,
    /// A single PNG of all layers together, named after the project.
    Composite,
}

/// A rendered output file.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ExportedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedFile")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The project had no images; nothing was delivered.
    Nothing,
    /// One file went to [`ExportSink::deliver_file`].
    Single { file_name: String },
    /// Several files went to [`ExportSink::deliver_bundle`].
    Bundle { bundle_name: String, files: usize },
}

/// Progress callback for export rendering.
pub type ProgressCallback<'a> = &'a (dyn Fn(ExportProgress) + Send + Sync);

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    /// Outputs finished so far.
    pub completed: usize,
    /// Outputs this export will produce.
    pub total: usize,
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Delivering,
    Complete,
    Failed,
}

/// Destination for exported files.
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Deliver a lone output file.
    async fn deliver_file(&self, file: ExportedFile) -> SnapperResult<()>;

    /// Deliver several files together under `bundle_name`.
    async fn deliver_bundle(&self, bundle_name: &str, files: Vec<ExportedFile>)
        -> SnapperResult<()>;
}

/// Output name for an exported image: final extension replaced by `.png`.
pub fn output_file_name(file_name: &str) -> String {
    let (stem, _) = split_extension(file_name);
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{stem}.png")
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() && !file_name[dot..].contains('/') => {
            (&file_name[..dot], &file_name[dot..])
        }
        _ => (file_name, ""),
    }
}

/// Rename repeated names to `name (2).png`, `name (3).png`, ...
pub fn dedupe_file_names(files: &mut [ExportedFile]) {
    let mut used: HashSet<String> = HashSet::with_capacity(files.len());
    for file in files.iter_mut() {
        if used.insert(file.file_name.clone()) {
            continue;
        }
        let (stem, ext) = split_extension(&file.file_name);
        let (stem, ext) = (stem.to_string(), ext.to_string());
        let mut n = 2u32;
        loop {
            let candidate = format!("{stem} ({n}){ext}");
            if used.insert(candidate.clone()) {
                file.file_name = candidate;
                break;
            }
            n += 1;
        }
    }
}

/// Render every output of an export without delivering anything.
///
/// Stops at the first decode or encode failure.
pub fn render_exports(
    project: &Project,
    images: &[ImageItem],
    scope: ExportScope,
    progress: Option<ProgressCallback<'_>>,
) -> SnapperResult<Vec<ExportedFile>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let options = RenderOptions::export();
    let (cw, ch) = (project.canvas_width, project.canvas_height);
    let total = match scope {
        ExportScope::EachImage => images.len(),
        ExportScope::Composite => 1,
    };
    report(progress, 0, total, ExportStage::Preparing);

    let mut files = Vec::with_capacity(total);
    match scope {
        ExportScope::EachImage => {
            for (index, image) in images.iter().enumerate() {
                let raster = decode_image(image)?;
                let layer = RenderLayer::new(image, Some(&raster));
                let pixmap = render_to_pixmap(cw, ch, &[layer], None, &options)?;
                files.push(ExportedFile {
                    file_name: output_file_name(&image.file_name),
                    bytes: encode_png(&pixmap)?,
                });
                tracing::debug!(image = %image.id, file = %image.file_name, "Rendered export");
                report(progress, index + 1, total, ExportStage::Rendering);
            }
        }
        ExportScope::Composite => {
            let rasters = images
                .iter()
                .map(decode_image)
                .collect::<SnapperResult<Vec<Raster>>>()?;
            let layers: Vec<RenderLayer<'_>> = images
                .iter()
                .zip(rasters.iter())
                .map(|(image, raster)| RenderLayer::new(image, Some(raster)))
                .collect();
            let pixmap = render_to_pixmap(cw, ch, &layers, None, &options)?;
            files.push(ExportedFile {
                file_name: format!("{}.png", project.name),
                bytes: encode_png(&pixmap)?,
            });
            report(progress, 1, total, ExportStage::Rendering);
        }
    }

    dedupe_file_names(&mut files);
    Ok(files)
}

/// Render and deliver an export.
///
/// Nothing reaches the sink unless every output rendered successfully.
pub async fn export_project(
    project: &Project,
    images: &[ImageItem],
    scope: ExportScope,
    sink: &dyn ExportSink,
    progress: Option<ProgressCallback<'_>>,
) -> SnapperResult<ExportOutcome> {
    if images.is_empty() {
        tracing::info!(project = %project.id, "No images to export");
        return Ok(ExportOutcome::Nothing);
    }

    tracing::info!(
        project = %project.id,
        scope = ?scope,
        images = images.len(),
        width = project.canvas_width,
        height = project.canvas_height,
        "Starting export"
    );

    let mut files = match render_exports(project, images, scope, progress) {
        Ok(files) => files,
        Err(err) => {
            tracing::warn!(project = %project.id, error = %err, "Export aborted");
            report(progress, 0, images.len(), ExportStage::Failed);
            return Err(err);
        }
    };
    let total = files.len();
    report(progress, total, total, ExportStage::Delivering);

    let delivered = if total == 1 {
        let file = files.remove(0);
        let file_name = file.file_name.clone();
        sink.deliver_file(file).await.map(|()| ExportOutcome::Single { file_name })
    } else {
        let bundle_name = project.name.clone();
        sink.deliver_bundle(&bundle_name, files)
            .await
            .map(|()| ExportOutcome::Bundle { bundle_name, files: total })
    };

    match &delivered {
        Ok(outcome) => {
            tracing::info!(project = %project.id, outcome = ?outcome, "Export delivered");
            report(progress, total, total, ExportStage::Complete);
        }
        Err(err) => {
            tracing::warn!(project = %project.id, error = %err, "Export delivery failed");
            report(progress, total, total, ExportStage::Failed);
        }
    }
    delivered
}

fn report(progress: Option<ProgressCallback<'_>>, completed: usize, total: usize, stage: ExportStage) {
    if let Some(cb) = progress {
        cb(ExportProgress {
            completed,
            total,
            stage,
        });
    }
}

/// Refuses a second export while one is running.
#[derive(Debug, Clone, Default)]
pub struct ExportGate {
    busy: Arc<AtomicBool>,
}

impl ExportGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate until the returned guard drops.
    pub fn try_begin(&self) -> SnapperResult<ExportGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SnapperError::ExportBusy);
        }
        Ok(ExportGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds an [`ExportGate`] closed.
#[derive(Debug)]
pub struct ExportGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Writes exports into a directory on disk.
///
/// A single file lands directly in the directory; a bundle becomes a
/// subdirectory named after the bundle.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where [`ExportSink::deliver_file`] writes `file_name`.
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(sanitize_file_name(file_name))
    }

    /// Where [`ExportSink::deliver_bundle`] writes `bundle_name`.
    pub fn bundle_path(&self, bundle_name: &str) -> PathBuf {
        self.dir.join(sanitize_file_name(bundle_name))
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn deliver_file(&self, file: ExportedFile) -> SnapperResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_path(&file.file_name);
        write_atomic(&path, &file.bytes).await?;
        tracing::info!(path = %path.display(), bytes = file.bytes.len(), "Wrote export");
        Ok(())
    }

    async fn deliver_bundle(
        &self,
        bundle_name: &str,
        files: Vec<ExportedFile>,
    ) -> SnapperResult<()> {
        let bundle_dir = self.bundle_path(bundle_name);
        tokio::fs::create_dir_all(&bundle_dir).await?;
        // Distinct names may collide once sanitized.
        let mut files: Vec<ExportedFile> = files
            .into_iter()
            .map(|file| ExportedFile {
                file_name: sanitize_file_name(&file.file_name),
                bytes: file.bytes,
            })
            .collect();
        dedupe_file_names(&mut files);
        for file in &files {
            write_atomic(&bundle_dir.join(&file.file_name), &file.bytes).await?;
        }
        tracing::info!(path = %bundle_dir.display(), files = files.len(), "Wrote export bundle");
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> SnapperResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Make a user-supplied name safe as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "export".to_string(),
        _ => cleaned,
    }
}

/// A delivery captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    File(ExportedFile),
    Bundle {
        bundle_name: String,
        files: Vec<ExportedFile>,
    },
}

/// Keeps deliveries in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Delivery>> {
        self.deliveries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn deliver_file(&self, file: ExportedFile) -> SnapperResult<()> {
        self.lock().push(Delivery::File(file));
        Ok(())
    }

    async fn deliver_bundle(
        &self,
        bundle_name: &str,
        files: Vec<ExportedFile>,
    ) -> SnapperResult<()> {
        self.lock().push(Delivery::Bundle {
            bundle_name: bundle_name.to_string(),
            files,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use sizesnapper_project_model::{NewImage, Transform};

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn layer(project: &Project, name: &str, order: u32, bytes: Vec<u8>) -> ImageItem {
        ImageItem::new(&project.id, NewImage::new(name, bytes, "image/png"), order)
    }

    fn file(name: &str) -> ExportedFile {
        ExportedFile {
            file_name: name.to_string(),
            bytes: Vec::new(),
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("photo.jpg"), "photo.png");
        assert_eq!(output_file_name("photo.final.jpeg"), "photo.final.png");
        assert_eq!(output_file_name("noext"), "noext.png");
        assert_eq!(output_file_name("trailing."), "trailing..png");
        assert_eq!(output_file_name(".jpg"), "image.png");
    }

    #[test]
    fn test_dedupe_file_names() {
        let mut files = vec![file("a.png"), file("a.png"), file("b.png"), file("a.png")];
        dedupe_file_names(&mut files);
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "a (2).png", "b.png", "a (3).png"]);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Poster"), "Poster");
        assert_eq!(sanitize_file_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_file_name(".."), "export");
        assert_eq!(sanitize_file_name("   "), "export");
    }

    #[test]
    fn test_gate_refuses_reentry_until_guard_drops() {
        let gate = ExportGate::new();
        let guard = gate.try_begin().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.try_begin(), Err(SnapperError::ExportBusy)));
        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_begin().is_ok());
    }

    #[tokio::test]
    async fn test_no_images_leaves_sink_untouched() {
        let project = Project::new("Empty", 10, 10).unwrap();
        let sink = MemorySink::new();
        let outcome = export_project(&project, &[], ExportScope::EachImage, &sink, None)
            .await
            .unwrap();
        assert_eq!(outcome, ExportOutcome::Nothing);
        assert!(sink.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_single_image_is_delivered_directly() {
        let project = Project::new("Solo", 8, 8).unwrap();
        let images = vec![layer(&project, "pic.jpg", 0, png_bytes(4, 4, [1, 2, 3, 255]))];
        let sink = MemorySink::new();
        let outcome = export_project(&project, &images, ExportScope::EachImage, &sink, None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::Single {
                file_name: "pic.png".to_string()
            }
        );
        match &sink.deliveries()[..] {
            [Delivery::File(f)] => {
                let decoded = image::load_from_memory(&f.bytes).unwrap();
                assert_eq!((decoded.width(), decoded.height()), (8, 8));
            }
            other => panic!("unexpected deliveries: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_failure_delivers_nothing() {
        let project = Project::new("Broken", 8, 8).unwrap();
        let images = vec![
            layer(&project, "ok.png", 0, png_bytes(2, 2, [0, 0, 0, 255])),
            layer(&project, "bad.png", 1, b"nope".to_vec()),
        ];
        let sink = MemorySink::new();
        let stages = Mutex::new(Vec::new());
        let cb = |p: ExportProgress| stages.lock().unwrap().push(p.stage);

        let err = export_project(&project, &images, ExportScope::EachImage, &sink, Some(&cb))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapperError::Decode { ref file_name, .. } if file_name == "bad.png"));
        assert!(sink.deliveries().is_empty());
        assert_eq!(stages.lock().unwrap().last(), Some(&ExportStage::Failed));
    }

    #[tokio::test]
    async fn test_composite_is_one_file_named_after_project() {
        let project = Project::new("Poster", 6, 6).unwrap();
        let images = vec![
            layer(&project, "a.png", 0, png_bytes(6, 6, [255, 0, 0, 255])),
            layer(&project, "b.png", 1, png_bytes(3, 3, [0, 0, 255, 255]))
                .with_transform(Transform::new(3.0, 3.0, 1.0)),
        ];
        let sink = MemorySink::new();
        let outcome = export_project(&project, &images, ExportScope::Composite, &sink, None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::Single {
                file_name: "Poster.png".to_string()
            }
        );
        let Delivery::File(f) = &sink.deliveries()[0] else {
            panic!("expected a file");
        };
        let decoded = image::load_from_memory(&f.bytes).unwrap().into_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(4, 4).0, [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn test_progress_counts_outputs() {
        let project = Project::new("Progress", 4, 4).unwrap();
        let images: Vec<ImageItem> = (0..3)
            .map(|i| layer(&project, &format!("{i}.png"), i, png_bytes(1, 1, [9, 9, 9, 255])))
            .collect();
        let seen = Mutex::new(Vec::new());
        let cb = |p: ExportProgress| seen.lock().unwrap().push(p);

        export_project(&project, &images, ExportScope::EachImage, &MemorySink::new(), Some(&cb))
            .await
            .unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first().map(|p| p.stage), Some(ExportStage::Preparing));
        let last = seen.last().copied().unwrap();
        assert_eq!((last.completed, last.total, last.stage), (3, 3, ExportStage::Complete));
    }

    #[tokio::test]
    async fn test_directory_sink_layout() {
        let dir = std::env::temp_dir().join("sizesnapper_directory_sink_test");
        let _ = std::fs::remove_dir_all(&dir);
        let sink = DirectorySink::new(&dir);

        sink.deliver_file(ExportedFile {
            file_name: "one.png".to_string(),
            bytes: vec![1, 2, 3],
        })
        .await
        .unwrap();
        sink.deliver_bundle("My/Project", vec![file("a.png"), file("b.png")])
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.join("one.png")).unwrap(), vec![1, 2, 3]);
        assert!(dir.join("My_Project").join("a.png").exists());
        assert!(dir.join("My_Project").join("b.png").exists());
        assert!(!dir.join("one.png.tmp").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_bundle_names_colliding_after_sanitizing_are_kept_apart() {
        let dir = std::env::temp_dir().join("sizesnapper_directory_sink_collide");
        let _ = std::fs::remove_dir_all(&dir);
        let sink = DirectorySink::new(&dir);

        let slashed = ExportedFile {
            file_name: "a/b.png".to_string(),
            bytes: vec![1],
        };
        let plain = ExportedFile {
            file_name: "a_b.png".to_string(),
            bytes: vec![2],
        };
        sink.deliver_bundle("Poster", vec![slashed, plain]).await.unwrap();

        let bundle = dir.join("Poster");
        assert_eq!(std::fs::read(bundle.join("a_b.png")).unwrap(), vec![1]);
        assert_eq!(std::fs::read(bundle.join("a_b (2).png")).unwrap(), vec![2]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
