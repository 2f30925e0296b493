//! SizeSnapper Editor
//!
//! Interactive manipulation of an open project:
//! - **Viewport:** fitting the padded preview into a container and mapping
//!   pointer positions to canvas space
//! - **Hit-testing:** which layer is under the pointer
//! - **Controller:** selection, drag-to-move, arrow-key nudge, scale edits
//! - **Debounce:** per-layer delayed persistence of transform edits
//! - **Session:** the owning view tying model, rasters, store and export together

pub mod cache;
pub mod controller;
pub mod debounce;
pub mod session;
pub mod viewport;

pub use cache::RasterCache;
pub use controller::{
    parse_scale, Controller, DragState, Key, KeyResponse, LayerEdit, PointerEvent, ScaleLimits,
    SCALE_STEP,
};
pub use debounce::{PersistFailure, PersistScheduler};
pub use hit_test::{hit_test, LayerSizes};
pub use session::EditorSession;
pub use viewport::ViewportLayout;
