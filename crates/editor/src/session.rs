//! An open project in the editor.

use std::sync::Arc;

use tiny_skia::Pixmap;

use sizesnapper_common::config::EditorDefaults;
use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::{
    apply_transform_delta, next_order, sort_by_order, ImageItem, NewImage, Project, TransformUpdate,
};
use sizesnapper_render_engine::{
    export_project, render_to_pixmap, scale_surface, ExportGate, ExportOutcome, ExportScope, ExportSink,
    ProgressCallback, RenderLayer, RenderOptions,
};
use sizesnapper_store::ProjectStore;

use crate::cache::{DecodeRequest, DecodedBatch, RasterCache};
use crate::controller::{parse_scale, Controller, DragState, Key, KeyResponse, LayerEdit, PointerEvent};
use crate::debounce::{PersistFailure, PersistScheduler};
use crate::viewport::ViewportLayout;

/// Everything the editor holds for one open project.
///
/// The in-memory layers are the source of truth for rendering and export;
/// transform edits reach the store through the debounce scheduler.
pub struct EditorSession {
    store: Arc<dyn ProjectStore>,
    project: Project,
    layers: Vec<ImageItem>,
    rasters: RasterCache,
    controller: Controller,
    layout: ViewportLayout,
    scheduler: PersistScheduler,
    export_gate: ExportGate,
    container_margin: f64,
}

impl EditorSession {
    /// Load a project and decode its layers.
    pub async fn open(
        store: Arc<dyn ProjectStore>,
        project_id: &str,
        settings: &EditorDefaults,
    ) -> SnapperResult<Self> {
        let project = store.get_project(project_id).await?;
        let mut layers = store.list_images(project_id).await?;
        sort_by_order(&mut layers);

        let layout = ViewportLayout::new(
            project.canvas_width,
            project.canvas_height,
            settings.viewport_padding,
        );
        let scheduler = PersistScheduler::new(Arc::clone(&store), settings.debounce_window());

        let mut session = Self {
            store,
            project,
            layers,
            rasters: RasterCache::new(),
            controller: Controller::from_defaults(settings),
            layout,
            scheduler,
            export_gate: ExportGate::new(),
            container_margin: settings.container_margin as f64,
        };
        session.refresh_rasters().await?;

        tracing::info!(
            project = %session.project.id,
            name = %session.project.name,
            layers = session.layers.len(),
            decoded = session.rasters.len(),
            "Opened project"
        );
        Ok(session)
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Layers in paint order.
    pub fn layers(&self) -> &[ImageItem] {
        &self.layers
    }

    pub fn layer(&self, image_id: &str) -> Option<&ImageItem> {
        self.layers.iter().find(|l| l.id == image_id)
    }

    pub fn rasters(&self) -> &RasterCache {
        &self.rasters
    }

    pub fn layout(&self) -> &ViewportLayout {
        &self.layout
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.controller.selected_id()
    }

    pub fn selected(&self) -> Option<&ImageItem> {
        self.selected_id().and_then(|id| self.layer(id))
    }

    pub fn drag_state(&self) -> &DragState {
        self.controller.state()
    }

    /// Slider position for the selected layer, in percent.
    pub fn selected_scale_percent(&self) -> Option<u32> {
        self.selected()
            .map(|layer| self.controller.limits().to_percent(layer.scale()))
    }

    /// Whether an export could start now.
    pub fn can_export(&self) -> bool {
        !self.layers.is_empty() && !self.export_gate.is_busy()
    }

    /// Resize the preview to a container. Returns the new display scale.
    pub fn fit_container(&mut self, width: f64, height: f64) -> f64 {
        self.layout.fit(width, height, self.container_margin)
    }

    /// Write pending edits, then reload the project and its layers.
    pub async fn reload(&mut self) -> SnapperResult<()> {
        self.scheduler.flush_all().await;
        self.project = self.store.get_project(&self.project.id).await?;
        let mut layers = self.store.list_images(&self.project.id).await?;
        sort_by_order(&mut layers);
        let gone: Vec<String> = self
            .layers
            .iter()
            .filter(|old| !layers.iter().any(|l| l.id == old.id))
            .map(|old| old.id.clone())
            .collect();
        for id in &gone {
            self.controller.forget(id);
        }
        self.layers = layers;
        self.layout.canvas_width = self.project.canvas_width;
        self.layout.canvas_height = self.project.canvas_height;
        self.refresh_rasters().await
    }

    /// Upload new layers on top of the existing ones.
    pub async fn add_images(&mut self, uploads: Vec<NewImage>) -> SnapperResult<Vec<String>> {
        let mut ids = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let image = ImageItem::new(&self.project.id, upload, next_order(&self.layers));
            self.store.create_image(&image).await?;
            tracing::info!(
                project = %self.project.id,
                image = %image.id,
                file = %image.file_name,
                order = image.order,
                "Added image"
            );
            ids.push(image.id.clone());
            self.layers.push(image);
        }
        if !ids.is_empty() {
            self.project.touch();
        }
        self.refresh_rasters().await?;
        Ok(ids)
    }

    /// Delete a layer, clearing the selection if it pointed at it.
    pub async fn remove_image(&mut self, image_id: &str) -> SnapperResult<()> {
        let index = self.index_of(image_id)?;
        self.store.delete_image(image_id).await?;
        self.scheduler.cancel(image_id);
        self.layers.remove(index);
        self.controller.forget(image_id);
        tracing::info!(project = %self.project.id, image = image_id, "Removed image");
        self.refresh_rasters().await
    }

    /// Decode any layers missing from the raster cache.
    pub async fn refresh_rasters(&mut self) -> SnapperResult<()> {
        let request = self.begin_raster_refresh();
        let batch = RasterCache::decode_batch(request).await?;
        self.finish_raster_refresh(batch);
        Ok(())
    }

    /// First half of [`refresh_rasters`](Self::refresh_rasters), for hosts
    /// that decode elsewhere.
    pub fn begin_raster_refresh(&mut self) -> DecodeRequest {
        self.rasters.request(&self.layers)
    }

    /// Commit a decoded batch. Returns `false` if the layer set changed
    /// since the batch was requested.
    pub fn finish_raster_refresh(&mut self, batch: DecodedBatch) -> bool {
        self.rasters.commit(batch)
    }

    /// Select a layer by id, or clear the selection.
    pub fn select(&mut self, image_id: Option<&str>) -> SnapperResult<()> {
        if let Some(id) = image_id {
            self.index_of(id)?;
        }
        self.controller.select(image_id.map(str::to_string));
        Ok(())
    }

    /// Route pointer input (screen coordinates relative to the preview).
    pub fn pointer(&mut self, event: PointerEvent) -> SnapperResult<()> {
        let edit = self
            .controller
            .handle_pointer(event, &self.layout, &self.layers, &self.rasters);
        match edit {
            Some(edit) => self.apply(edit),
            None => Ok(()),
        }
    }

    /// Route a key press.
    pub fn key(&mut self, key: &Key) -> SnapperResult<KeyResponse> {
        let response = self.controller.handle_key(key, &self.layers);
        if let Some(edit) = &response.edit {
            self.apply(edit.clone())?;
        }
        Ok(response)
    }

    /// Set the selected layer's scale, clamped. `false` when nothing is selected.
    pub fn set_scale(&mut self, scale: f64) -> SnapperResult<bool> {
        let edit = self.controller.scale_edit(scale);
        self.apply_optional(edit)
    }

    /// Nudge the selected layer's scale by `delta`, clamped.
    pub fn step_scale(&mut self, delta: f64) -> SnapperResult<bool> {
        let edit = self.controller.step_edit(delta, &self.layers);
        self.apply_optional(edit)
    }

    /// Set the selected layer's scale from a slider percentage.
    pub fn set_scale_percent(&mut self, percent: f64) -> SnapperResult<bool> {
        let edit = self.controller.percent_edit(percent);
        self.apply_optional(edit)
    }

    /// Set the selected layer's scale from typed text.
    pub fn set_scale_text(&mut self, input: &str) -> SnapperResult<bool> {
        let scale = parse_scale(input)
            .ok_or_else(|| SnapperError::validation(format!("not a scale: {input:?}")))?;
        self.set_scale(scale)
    }

    /// Apply a transform change in memory now and persist it after the
    /// debounce window.
    pub fn update_transform(&mut self, image_id: &str, update: TransformUpdate) -> SnapperResult<()> {
        update.validate()?;
        let index = self.index_of(image_id)?;
        self.layers[index] = apply_transform_delta(&self.layers[index], &update);
        self.scheduler.schedule(image_id, update)
    }

    /// Render the padded interactive preview.
    pub fn render_preview(&self) -> SnapperResult<Pixmap> {
        let layers: Vec<RenderLayer<'_>> = self
            .layers
            .iter()
            .map(|image| RenderLayer::new(image, self.rasters.get(&image.id)))
            .collect();
        let options =
            RenderOptions::interactive(self.layout.padding, self.layout.display_scale as f32);
        render_to_pixmap(
            self.project.canvas_width,
            self.project.canvas_height,
            &layers,
            self.selected_id(),
            &options,
        )
    }

    /// Render the preview at its on-screen size.
    pub fn render_screen(&self) -> SnapperResult<Pixmap> {
        let full = self.render_preview()?;
        if self.layout.display_scale >= 1.0 {
            return Ok(full);
        }
        scale_surface(&full, self.layout.display_scale as f32)
    }

    /// Export the current in-memory state. A second call while one is
    /// running fails with [`SnapperError::ExportBusy`].
    pub async fn export(
        &self,
        scope: ExportScope,
        sink: &dyn ExportSink,
        progress: Option<ProgressCallback<'_>>,
    ) -> SnapperResult<ExportOutcome> {
        let _guard = self.export_gate.try_begin()?;
        export_project(&self.project, &self.layers, scope, sink, progress).await
    }

    /// Persist all pending edits now. Returns how many were written.
    pub async fn flush(&self) -> usize {
        self.scheduler.flush_all().await
    }

    /// Number of layers with an edit waiting to be written.
    pub fn pending_writes(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// Take the persistence failures recorded so far.
    pub fn drain_failures(&self) -> Vec<PersistFailure> {
        self.scheduler.drain_failures()
    }

    /// Tear down, discarding edits still waiting on their timers.
    ///
    /// Returns how many pending writes were cancelled.
    pub fn close(self) -> usize {
        let cancelled = self.scheduler.cancel_all();
        tracing::info!(project = %self.project.id, cancelled, "Closed project");
        cancelled
    }

    fn apply(&mut self, edit: LayerEdit) -> SnapperResult<()> {
        self.update_transform(&edit.image_id, edit.update)
    }

    fn apply_optional(&mut self, edit: Option<LayerEdit>) -> SnapperResult<bool> {
        match edit {
            Some(edit) => self.apply(edit).map(|()| true),
            None => Ok(false),
        }
    }

    fn index_of(&self, image_id: &str) -> SnapperResult<usize> {
        self.layers
            .iter()
            .position(|l| l.id == image_id)
            .ok_or_else(|| SnapperError::image_not_found(image_id))
    }
}
