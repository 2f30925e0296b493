//! Pointer, keyboard and scale input turned into layer edits.
//!
//! The controller owns selection and the drag state machine:
//!
//! ```text
//!            down on layer                    move
//!   Idle ───────────────────► Dragging ◄──────────┐
//!    ▲                          │   └─────────────┘
//!    └──────── up / leave ──────┘
//! ```
//!
//! It never touches storage. Each handler returns the [`LayerEdit`] the
//! caller should apply to the model.

use sizesnapper_common::config::EditorDefaults;
use sizesnapper_project_model::{ImageItem, Point, TransformUpdate};

use crate::hit_test::{hit_test, LayerSizes};
use crate::viewport::ViewportLayout;

/// Increment used by the scale step buttons.
pub const SCALE_STEP: f64 = 0.01;

/// Drag state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        layer_id: String,
        /// Canvas-space pointer position at pointer-down.
        pointer_start: Point,
        /// Layer offset at pointer-down.
        layer_start: Point,
    },
}

/// Pointer input in screen coordinates relative to the preview surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up,
    Leave,
}

/// Keyboard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Other(String),
}

impl Key {
    /// Parse a key name (`ArrowLeft`, `left`, ...).
    pub fn from_name(name: &str) -> Key {
        match name.trim().to_ascii_lowercase().as_str() {
            "arrowleft" | "left" => Key::ArrowLeft,
            "arrowright" | "right" => Key::ArrowRight,
            "arrowup" | "up" => Key::ArrowUp,
            "arrowdown" | "down" => Key::ArrowDown,
            _ => Key::Other(name.to_string()),
        }
    }

    /// Unit offset for arrow keys.
    fn direction(&self) -> Option<(f64, f64)> {
        match self {
            Key::ArrowLeft => Some((-1.0, 0.0)),
            Key::ArrowRight => Some((1.0, 0.0)),
            Key::ArrowUp => Some((0.0, -1.0)),
            Key::ArrowDown => Some((0.0, 1.0)),
            Key::Other(_) => None,
        }
    }
}

/// A transform change for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEdit {
    pub image_id: String,
    pub update: TransformUpdate,
}

/// Outcome of a key press.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyResponse {
    /// The host should suppress the key's default action (scrolling).
    pub prevent_default: bool,
    pub edit: Option<LayerEdit>,
}

/// Bounds for interactive scale edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self { min: 0.01, max: 5.0 }
    }
}

impl ScaleLimits {
    pub fn from_defaults(defaults: &EditorDefaults) -> Self {
        if defaults.min_scale > 0.0 && defaults.max_scale >= defaults.min_scale {
            Self {
                min: defaults.min_scale,
                max: defaults.max_scale,
            }
        } else {
            tracing::warn!(
                min = defaults.min_scale,
                max = defaults.max_scale,
                "Ignoring invalid scale limits"
            );
            Self::default()
        }
    }

    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min;
        }
        scale.clamp(self.min, self.max)
    }

    /// `current + delta`, clamped.
    pub fn step(&self, current: f64, delta: f64) -> f64 {
        self.clamp(current + delta)
    }

    /// Slider position for a scale, in whole percent.
    pub fn to_percent(&self, scale: f64) -> u32 {
        (self.clamp(scale) * 100.0).round() as u32
    }

    /// Scale for a slider position in percent.
    pub fn from_percent(&self, percent: f64) -> f64 {
        self.clamp(percent / 100.0)
    }
}

/// Parse user-typed scale text: `1.5`, or `150%`.
///
/// Returns `None` for anything that is not a finite number.
pub fn parse_scale(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    let (number, divisor) = match trimmed.strip_suffix('%') {
        Some(percent) => (percent.trim_end(), 100.0),
        None => (trimmed, 1.0),
    };
    let value: f64 = number.parse().ok()?;
    let value = value / divisor;
    value.is_finite().then_some(value)
}

/// Selection and drag handling for one canvas.
#[derive(Debug, Clone)]
pub struct Controller {
    state: DragState,
    selected: Option<String>,
    limits: ScaleLimits,
    nudge_step: f64,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ScaleLimits::default(), 1.0)
    }
}

impl Controller {
    pub fn new(limits: ScaleLimits, nudge_step: f64) -> Self {
        Self {
            state: DragState::Idle,
            selected: None,
            limits,
            nudge_step,
        }
    }

    pub fn from_defaults(defaults: &EditorDefaults) -> Self {
        Self::new(ScaleLimits::from_defaults(defaults), defaults.nudge_step)
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    pub fn select(&mut self, image_id: Option<String>) {
        self.selected = image_id;
    }

    /// Drop any reference to a layer that no longer exists.
    pub fn forget(&mut self, image_id: &str) {
        if self.selected.as_deref() == Some(image_id) {
            self.selected = None;
        }
        if matches!(&self.state, DragState::Dragging { layer_id, .. } if layer_id == image_id) {
            self.state = DragState::Idle;
        }
    }

    /// Handle pointer input.
    ///
    /// Pointer-down replaces the selection with whatever is under the
    /// pointer (possibly nothing). Moves while dragging yield a whole-pixel
    /// position edit.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        layout: &ViewportLayout,
        layers: &[ImageItem],
        sizes: &dyn LayerSizes,
    ) -> Option<LayerEdit> {
        match event {
            PointerEvent::Down(screen) => {
                let point = layout.screen_to_canvas(screen);
                let hit = hit_test(point, layers, sizes, self.selected.as_deref());
                self.state = match hit
                    .as_deref()
                    .and_then(|id| layers.iter().find(|l| l.id == id))
                {
                    Some(layer) => DragState::Dragging {
                        layer_id: layer.id.clone(),
                        pointer_start: point,
                        layer_start: Point::new(layer.x(), layer.y()),
                    },
                    None => DragState::Idle,
                };
                tracing::trace!(x = point.x, y = point.y, hit = ?hit, "Pointer down");
                self.selected = hit;
                None
            }
            PointerEvent::Move(screen) => {
                let DragState::Dragging {
                    layer_id,
                    pointer_start,
                    layer_start,
                } = &self.state
                else {
                    return None;
                };
                let point = layout.screen_to_canvas(screen);
                let delta = point.delta_from(pointer_start);
                let target = Point::new(layer_start.x + delta.x, layer_start.y + delta.y).round();
                Some(LayerEdit {
                    image_id: layer_id.clone(),
                    update: TransformUpdate::position(target.x, target.y),
                })
            }
            PointerEvent::Up | PointerEvent::Leave => {
                self.state = DragState::Idle;
                None
            }
        }
    }

    /// Handle a key press. Arrow keys nudge the selected layer.
    pub fn handle_key(&self, key: &Key, layers: &[ImageItem]) -> KeyResponse {
        let Some((dx, dy)) = key.direction() else {
            return KeyResponse::default();
        };
        let Some(layer) = self.selected_layer(layers) else {
            return KeyResponse::default();
        };
        let update = if dx != 0.0 {
            TransformUpdate {
                x: Some(layer.x() + dx * self.nudge_step),
                ..TransformUpdate::default()
            }
        } else {
            TransformUpdate {
                y: Some(layer.y() + dy * self.nudge_step),
                ..TransformUpdate::default()
            }
        };
        KeyResponse {
            prevent_default: true,
            edit: Some(LayerEdit {
                image_id: layer.id.clone(),
                update,
            }),
        }
    }

    /// Set the selected layer's scale, clamped to the limits.
    pub fn scale_edit(&self, scale: f64) -> Option<LayerEdit> {
        let image_id = self.selected.clone()?;
        Some(LayerEdit {
            image_id,
            update: TransformUpdate::scale(self.limits.clamp(scale)),
        })
    }

    /// Step the selected layer's scale by `delta`, clamped.
    pub fn step_edit(&self, delta: f64, layers: &[ImageItem]) -> Option<LayerEdit> {
        let layer = self.selected_layer(layers)?;
        self.scale_edit(self.limits.step(layer.scale(), delta))
    }

    /// Set the selected layer's scale from a slider percentage.
    pub fn percent_edit(&self, percent: f64) -> Option<LayerEdit> {
        self.scale_edit(self.limits.from_percent(percent))
    }

    fn selected_layer<'a>(&self, layers: &'a [ImageItem]) -> Option<&'a ImageItem> {
        let id = self.selected.as_deref()?;
        layers.iter().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizesnapper_project_model::{NewImage, Size, Transform};
    use std::collections::HashMap;

    fn setup() -> (Vec<ImageItem>, HashMap<String, Size>, ViewportLayout) {
        let layer = ImageItem::new("p", NewImage::new("a.png", vec![0u8], "image/png"), 0)
            .with_transform(Transform::new(10.0, 20.0, 1.0));
        let sizes = HashMap::from([(layer.id.clone(), Size::new(100, 50))]);
        let layout = ViewportLayout {
            canvas_width: 400,
            canvas_height: 300,
            padding: 200,
            display_scale: 0.5,
        };
        (vec![layer], sizes, layout)
    }

    fn screen(layout: &ViewportLayout, x: f64, y: f64) -> Point {
        layout.canvas_to_screen(Point::new(x, y))
    }

    #[test]
    fn test_down_on_layer_selects_and_drags() {
        let (layers, sizes, layout) = setup();
        let mut c = Controller::default();
        let edit = c.handle_pointer(PointerEvent::Down(screen(&layout, 50.0, 40.0)), &layout, &layers, &sizes);
        assert!(edit.is_none());
        assert_eq!(c.selected_id(), Some(layers[0].id.as_str()));
        assert_eq!(
            c.state(),
            &DragState::Dragging {
                layer_id: layers[0].id.clone(),
                pointer_start: Point::new(50.0, 40.0),
                layer_start: Point::new(10.0, 20.0),
            }
        );
    }

    #[test]
    fn test_down_on_empty_space_clears_selection() {
        let (layers, sizes, layout) = setup();
        let mut c = Controller::default();
        c.select(Some(layers[0].id.clone()));
        c.handle_pointer(PointerEvent::Down(screen(&layout, -150.0, -150.0)), &layout, &layers, &sizes);
        assert_eq!(c.selected_id(), None);
        assert_eq!(c.state(), &DragState::Idle);
    }

    #[test]
    fn test_drag_moves_by_rounded_delta() {
        let (layers, sizes, layout) = setup();
        let mut c = Controller::default();
        c.handle_pointer(PointerEvent::Down(screen(&layout, 50.0, 40.0)), &layout, &layers, &sizes);
        let edit = c
            .handle_pointer(PointerEvent::Move(screen(&layout, 80.4, 9.6)), &layout, &layers, &sizes)
            .unwrap();
        assert_eq!(edit.image_id, layers[0].id);
        assert_eq!(edit.update, TransformUpdate::position(40.0, -10.0));

        c.handle_pointer(PointerEvent::Up, &layout, &layers, &sizes);
        assert!(!c.is_dragging());
        assert!(c
            .handle_pointer(PointerEvent::Move(screen(&layout, 0.0, 0.0)), &layout, &layers, &sizes)
            .is_none());
    }

    #[test]
    fn test_leave_ends_drag() {
        let (layers, sizes, layout) = setup();
        let mut c = Controller::default();
        c.handle_pointer(PointerEvent::Down(screen(&layout, 50.0, 40.0)), &layout, &layers, &sizes);
        c.handle_pointer(PointerEvent::Leave, &layout, &layers, &sizes);
        assert_eq!(c.state(), &DragState::Idle);
        assert!(c.selected_id().is_some());
    }

    #[test]
    fn test_arrow_keys_nudge_selected_layer() {
        let (layers, _, _) = setup();
        let mut c = Controller::default();
        assert_eq!(c.handle_key(&Key::ArrowLeft, &layers), KeyResponse::default());

        c.select(Some(layers[0].id.clone()));
        let left = c.handle_key(&Key::ArrowLeft, &layers);
        assert!(left.prevent_default);
        assert_eq!(left.edit.unwrap().update.x, Some(9.0));

        let down = c.handle_key(&Key::from_name("ArrowDown"), &layers);
        let update = down.edit.unwrap().update;
        assert_eq!((update.x, update.y), (None, Some(21.0)));

        let other = c.handle_key(&Key::from_name("Enter"), &layers);
        assert!(!other.prevent_default);
        assert!(other.edit.is_none());
    }

    #[test]
    fn test_scale_edits_clamp() {
        let (layers, _, _) = setup();
        let mut c = Controller::default();
        assert!(c.scale_edit(2.0).is_none());

        c.select(Some(layers[0].id.clone()));
        assert_eq!(c.scale_edit(9.0).unwrap().update.scale, Some(5.0));
        assert_eq!(c.scale_edit(0.0).unwrap().update.scale, Some(0.01));
        assert_eq!(c.percent_edit(150.0).unwrap().update.scale, Some(1.5));

        let stepped = c.step_edit(-SCALE_STEP, &layers).unwrap().update.scale.unwrap();
        assert!((stepped - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_percent_mapping() {
        let limits = ScaleLimits::default();
        assert_eq!(limits.to_percent(1.0), 100);
        assert_eq!(limits.to_percent(0.001), 1);
        assert_eq!(limits.to_percent(12.0), 500);
        assert_eq!(limits.from_percent(250.0), 2.5);
    }

    #[test]
    fn test_parse_scale() {
        assert_eq!(parse_scale(" 1.5 "), Some(1.5));
        assert_eq!(parse_scale("150%"), Some(1.5));
        assert_eq!(parse_scale("abc"), None);
        assert_eq!(parse_scale(""), None);
        assert_eq!(parse_scale("inf"), None);
        assert_eq!(parse_scale("NaN"), None);
    }

    #[test]
    fn test_forget_clears_selection_and_drag() {
        let (layers, sizes, layout) = setup();
        let mut c = Controller::default();
        c.handle_pointer(PointerEvent::Down(screen(&layout, 50.0, 40.0)), &layout, &layers, &sizes);
        c.forget(&layers[0].id);
        assert_eq!(c.selected_id(), None);
        assert_eq!(c.state(), &DragState::Idle);
    }
}
