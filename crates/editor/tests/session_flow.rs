use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sizesnapper_common::config::EditorDefaults;
use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_editor::{EditorSession, Key, PointerEvent};
use sizesnapper_project_model::{ImageItem, NewImage, Point, Project, Transform, TransformUpdate};
use sizesnapper_render_engine::{
    Delivery, ExportOutcome, ExportScope, ExportSink, ExportedFile, MemorySink,
};
use sizesnapper_store::{MemoryStore, ProjectStore};

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("png encode");
    buf
}

fn upload(name: &str, width: u32, height: u32) -> NewImage {
    NewImage::new(name, png(width, height, [200, 10, 10, 255]), "image/png")
}

async fn open_fresh(width: u32, height: u32) -> (Arc<MemoryStore>, EditorSession) {
    let store = Arc::new(MemoryStore::new());
    let project = Project::new("Flow", width, height).expect("valid project");
    store.create_project(&project).await.expect("create project");
    let session = EditorSession::open(store.clone(), &project.id, &EditorDefaults::default())
        .await
        .expect("open session");
    (store, session)
}

#[tokio::test]
async fn opening_missing_project_is_not_found() {
    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let err = EditorSession::open(store, "nope", &EditorDefaults::default())
        .await
        .err()
        .expect("open should fail");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn added_layers_stack_and_preview_is_padded() {
    let (store, mut session) = open_fresh(400, 300).await;
    let ids = session
        .add_images(vec![upload("a.png", 100, 50), upload("b.png", 20, 20)])
        .await
        .unwrap();

    let orders: Vec<u32> = session.layers().iter().map(|l| l.order).collect();
    assert_eq!(orders, vec![0, 1]);
    assert_eq!(store.list_images(&session.project().id).await.unwrap().len(), 2);
    assert_eq!(session.rasters().len(), 2);
    assert!(ids.iter().all(|id| session.layer(id).unwrap().transform == Transform::IDENTITY));

    let preview = session.render_preview().unwrap();
    assert_eq!((preview.width(), preview.height()), (800, 700));
}

#[tokio::test(start_paused = true)]
async fn drag_updates_model_now_and_store_after_quiet_period() {
    let (store, mut session) = open_fresh(400, 300).await;
    let ids = session.add_images(vec![upload("a.png", 100, 50)]).await.unwrap();
    let id = ids[0].as_str();
    let layout = *session.layout();

    session
        .pointer(PointerEvent::Down(layout.canvas_to_screen(Point::new(10.0, 10.0))))
        .unwrap();
    assert_eq!(session.selected_id(), Some(id));
    session
        .pointer(PointerEvent::Move(layout.canvas_to_screen(Point::new(35.0, 0.0))))
        .unwrap();
    session
        .pointer(PointerEvent::Move(layout.canvas_to_screen(Point::new(60.0, -20.0))))
        .unwrap();
    session.pointer(PointerEvent::Up).unwrap();

    assert_eq!(session.layer(id).unwrap().transform, Transform::new(50.0, -30.0, 1.0));
    assert_eq!(store.get_image(id).await.unwrap().transform, Transform::IDENTITY);
    assert_eq!(session.pending_writes(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        store.get_image(id).await.unwrap().transform,
        Transform::new(50.0, -30.0, 1.0)
    );
    assert_eq!(session.pending_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn scale_and_nudge_coalesce_into_one_write() {
    let (store, mut session) = open_fresh(400, 300).await;
    let ids = session.add_images(vec![upload("a.png", 100, 50)]).await.unwrap();
    let id = ids[0].as_str();

    session.select(Some(id)).unwrap();
    assert!(session.set_scale(7.0).unwrap());
    let response = session.key(&Key::ArrowRight).unwrap();
    assert!(response.prevent_default);
    assert!(session.step_scale(-0.5).unwrap());
    assert_eq!(session.selected_scale_percent(), Some(450));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(
        store.get_image(id).await.unwrap().transform,
        Transform::new(1.0, 0.0, 4.5)
    );
}

#[tokio::test]
async fn invalid_scale_text_is_rejected() {
    let (_store, mut session) = open_fresh(100, 100).await;
    let ids = session.add_images(vec![upload("a.png", 10, 10)]).await.unwrap();
    session.select(Some(&ids[0])).unwrap();

    assert!(matches!(
        session.set_scale_text("big"),
        Err(SnapperError::Validation { .. })
    ));
    assert!(session.set_scale_text("250%").unwrap());
    assert_eq!(session.layer(&ids[0]).unwrap().scale(), 2.5);
}

#[tokio::test]
async fn removing_selected_layer_clears_selection() {
    let (store, mut session) = open_fresh(100, 100).await;
    let ids = session
        .add_images(vec![upload("a.png", 10, 10), upload("b.png", 10, 10)])
        .await
        .unwrap();
    session.select(Some(&ids[1])).unwrap();

    session.remove_image(&ids[1]).await.unwrap();
    assert_eq!(session.selected_id(), None);
    assert_eq!(session.layers().len(), 1);
    assert!(store.get_image(&ids[1]).await.unwrap_err().is_not_found());
    assert!(session.rasters().get(&ids[1]).is_none());
    assert!(session.remove_image(&ids[1]).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn undecodable_layer_is_skipped_in_preview_but_fails_export() {
    let (_store, mut session) = open_fresh(50, 50).await;
    let ids = session
        .add_images(vec![
            upload("good.png", 10, 10),
            NewImage::new("broken.png", b"not an image".to_vec(), "image/png"),
        ])
        .await
        .unwrap();

    assert!(session.rasters().is_failed(&ids[1]));
    assert!(session.render_preview().is_ok());

    let sink = MemorySink::new();
    let err = session
        .export(ExportScope::EachImage, &sink, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapperError::Decode { .. }));
    assert!(sink.deliveries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_writes() {
    let (store, mut session) = open_fresh(100, 100).await;
    let ids = session.add_images(vec![upload("a.png", 10, 10)]).await.unwrap();
    session
        .update_transform(&ids[0], sizesnapper_project_model::TransformUpdate::position(7.0, 7.0))
        .unwrap();

    assert_eq!(session.close(), 1);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.get_image(&ids[0]).await.unwrap().transform, Transform::IDENTITY);
}

#[tokio::test]
async fn flush_persists_immediately() {
    let (store, mut session) = open_fresh(100, 100).await;
    let ids = session.add_images(vec![upload("a.png", 10, 10)]).await.unwrap();
    session.select(Some(&ids[0])).unwrap();
    session.set_scale_percent(300.0).unwrap();

    assert_eq!(session.flush().await, 1);
    assert_eq!(store.get_image(&ids[0]).await.unwrap().scale(), 3.0);
    assert!(session.drain_failures().is_empty());
}

#[tokio::test]
async fn stale_raster_batch_is_not_committed() {
    let (_store, mut session) = open_fresh(100, 100).await;
    session.add_images(vec![upload("a.png", 10, 10)]).await.unwrap();

    let stale = session.begin_raster_refresh();
    session.add_images(vec![upload("b.png", 10, 10)]).await.unwrap();
    let batch = sizesnapper_editor::RasterCache::decode_batch(stale).await.unwrap();
    assert!(!session.finish_raster_refresh(batch));
    assert_eq!(session.rasters().len(), 2);
}

#[derive(Default)]
struct SlowSink {
    inner: MemorySink,
}

#[async_trait]
impl ExportSink for SlowSink {
    async fn deliver_file(&self, file: ExportedFile) -> SnapperResult<()> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.deliver_file(file).await
    }

    async fn deliver_bundle(&self, bundle_name: &str, files: Vec<ExportedFile>) -> SnapperResult<()> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.deliver_bundle(bundle_name, files).await
    }
}

#[tokio::test]
async fn overlapping_export_is_refused() {
    let (_store, mut session) = open_fresh(64, 64).await;
    assert!(!session.can_export());
    session.add_images(vec![upload("a.png", 8, 8)]).await.unwrap();
    assert!(session.can_export());

    let sink = SlowSink::default();
    let (first, second) = tokio::join!(
        session.export(ExportScope::EachImage, &sink, None),
        session.export(ExportScope::EachImage, &sink, None)
    );
    assert_eq!(
        first.unwrap(),
        ExportOutcome::Single {
            file_name: "a.png".to_string()
        }
    );
    assert!(matches!(second, Err(SnapperError::ExportBusy)));
    assert!(session.can_export());
    assert!(matches!(&sink.inner.deliveries()[..], [Delivery::File(_)]));
}

/// Forwards to a `MemoryStore`, counting transform writes.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    patches: AtomicUsize,
}

impl CountingStore {
    fn patches(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectStore for CountingStore {
    async fn create_project(&self, project: &Project) -> SnapperResult<()> {
        self.inner.create_project(project).await
    }

    async fn get_project(&self, id: &str) -> SnapperResult<Project> {
        self.inner.get_project(id).await
    }

    async fn list_projects(&self) -> SnapperResult<Vec<Project>> {
        self.inner.list_projects().await
    }

    async fn update_project(&self, project: &Project) -> SnapperResult<()> {
        self.inner.update_project(project).await
    }

    async fn delete_project(&self, id: &str) -> SnapperResult<()> {
        self.inner.delete_project(id).await
    }

    async fn create_image(&self, image: &ImageItem) -> SnapperResult<()> {
        self.inner.create_image(image).await
    }

    async fn get_image(&self, id: &str) -> SnapperResult<ImageItem> {
        self.inner.get_image(id).await
    }

    async fn list_images(&self, project_id: &str) -> SnapperResult<Vec<ImageItem>> {
        self.inner.list_images(project_id).await
    }

    async fn patch_transform(&self, id: &str, update: &TransformUpdate) -> SnapperResult<()> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        self.inner.patch_transform(id, update).await
    }

    async fn delete_image(&self, id: &str) -> SnapperResult<()> {
        self.inner.delete_image(id).await
    }

    async fn close(&self) -> SnapperResult<()> {
        self.inner.close().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

#[tokio::test(start_paused = true)]
async fn long_drag_persists_with_a_single_write() {
    let store = Arc::new(CountingStore::default());
    let project = Project::new("Counted", 400, 300).unwrap();
    store.create_project(&project).await.unwrap();
    let mut session = EditorSession::open(store.clone(), &project.id, &EditorDefaults::default())
        .await
        .unwrap();
    let ids = session.add_images(vec![upload("a.png", 100, 50)]).await.unwrap();
    let layout = *session.layout();

    session
        .pointer(PointerEvent::Down(layout.canvas_to_screen(Point::new(10.0, 10.0))))
        .unwrap();
    for step in 1..=25 {
        let p = Point::new(10.0 + step as f64 * 3.0, 10.0 + step as f64);
        session
            .pointer(PointerEvent::Move(layout.canvas_to_screen(p)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    session.pointer(PointerEvent::Up).unwrap();
    session.key(&Key::ArrowDown).unwrap();
    assert_eq!(store.patches(), 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(store.patches(), 1);
    assert_eq!(
        store.get_image(&ids[0]).await.unwrap().transform,
        Transform::new(75.0, 26.0, 1.0)
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.patches(), 1);
}
