//! Image layer records and their transforms.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sizesnapper_common::clock::{now_millis, EpochMillis};

use crate::project::{new_id, ProjectError};

/// Placement of a layer on the canvas.
///
/// `x`/`y` are canvas-space pixels and may be negative or exceed the
/// canvas. `scale` multiplies the raster's natural dimensions uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Transform {
    /// Untransformed placement at the canvas origin.
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
    };

    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        Self { x, y, scale }
    }

    /// Apply a partial update, leaving unspecified fields untouched.
    pub fn updated(&self, update: &TransformUpdate) -> Transform {
        Transform {
            x: update.x.unwrap_or(self.x),
            y: update.y.unwrap_or(self.y),
            scale: update.scale.unwrap_or(self.scale),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A partial transform edit. `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl TransformUpdate {
    /// Move to an absolute offset.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            scale: None,
        }
    }

    /// Set an absolute scale.
    pub fn scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.scale.is_none()
    }

    /// Combine with a later update; the later value wins per field.
    pub fn merge(self, later: TransformUpdate) -> TransformUpdate {
        TransformUpdate {
            x: later.x.or(self.x),
            y: later.y.or(self.y),
            scale: later.scale.or(self.scale),
        }
    }

    /// Reject values that cannot describe a placement.
    ///
    /// Scale is only required to be finite and positive; the interactive
    /// `[0.01, 5.0]` range is enforced by the editor, not here.
    pub fn validate(&self) -> Result<(), ProjectError> {
        for (axis, value) in [("x", self.x), ("y", self.y)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ProjectError::invalid_transform(format!(
                        "{axis} must be a finite number, got {v}"
                    )));
                }
            }
        }
        if let Some(scale) = self.scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(ProjectError::invalid_transform(format!(
                    "scale must be a positive number, got {scale}"
                )));
            }
        }
        Ok(())
    }
}

/// An uploaded file that has not been placed on a canvas yet.
#[derive(Clone, PartialEq)]
pub struct NewImage {
    pub file_name: String,
    pub data: Arc<[u8]>,
    pub mime_type: String,
}

impl NewImage {
    pub fn new(
        file_name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl fmt::Debug for NewImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewImage")
            .field("file_name", &self.file_name)
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// One raster layer placed on a project's canvas.
#[derive(Clone, PartialEq)]
pub struct ImageItem {
    /// Unique image identifier (UUID).
    pub id: String,

    /// Owning project.
    pub project_id: String,

    /// Original file name, used to derive export names.
    pub file_name: String,

    /// Raw encoded bytes exactly as uploaded.
    pub data: Arc<[u8]>,

    /// Declared MIME type of `data`.
    pub mime_type: String,

    /// Position and scale on the canvas.
    pub transform: Transform,

    /// Paint order; higher values are drawn on top.
    pub order: u32,

    /// Creation timestamp (epoch ms).
    pub created_at: EpochMillis,
}

impl ImageItem {
    /// Place an upload on a project at the given z-index with the identity transform.
    pub fn new(project_id: impl Into<String>, upload: NewImage, order: u32) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.into(),
            file_name: upload.file_name,
            data: upload.data,
            mime_type: upload.mime_type,
            transform: Transform::IDENTITY,
            order,
            created_at: now_millis(),
        }
    }

    /// Builder-style transform override.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn x(&self) -> f64 {
        self.transform.x
    }

    pub fn y(&self) -> f64 {
        self.transform.y
    }

    pub fn scale(&self) -> f64 {
        self.transform.scale
    }
}

impl fmt::Debug for ImageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageItem")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("file_name", &self.file_name)
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("transform", &self.transform)
            .field("order", &self.order)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Sort layers into paint order (ascending z-index, stable).
pub fn sort_by_order(images: &mut [ImageItem]) {
    images.sort_by_key(|image| image.order);
}

/// The z-index a newly added layer receives.
///
/// Equal to the layer count while orders are dense; after deletions it
/// stays above every existing index so orders remain unique.
pub fn next_order(images: &[ImageItem]) -> u32 {
    images
        .iter()
        .map(|image| image.order.saturating_add(1))
        .max()
        .unwrap_or(0)
        .max(images.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> NewImage {
        NewImage::new("cat.jpg", vec![1u8, 2, 3], "image/jpeg")
    }

    #[test]
    fn test_new_image_has_identity_transform() {
        let image = ImageItem::new("p1", upload(), 3);
        assert_eq!(image.transform, Transform::IDENTITY);
        assert_eq!(image.order, 3);
        assert_eq!(&image.data[..], &[1, 2, 3]);
    }

    #[test]
    fn test_merge_later_wins_per_field() {
        let first = TransformUpdate::position(10.0, 20.0);
        let second = TransformUpdate {
            x: Some(15.0),
            ..TransformUpdate::default()
        };
        let third = TransformUpdate::scale(2.0);

        let merged = first.merge(second).merge(third);
        assert_eq!(merged.x, Some(15.0));
        assert_eq!(merged.y, Some(20.0));
        assert_eq!(merged.scale, Some(2.0));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        assert!(TransformUpdate::scale(0.0).validate().is_err());
        assert!(TransformUpdate::scale(-1.0).validate().is_err());
        assert!(TransformUpdate::scale(f64::NAN).validate().is_err());
        // Outside the slider range but still a valid model value.
        assert!(TransformUpdate::scale(12.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_position() {
        assert!(TransformUpdate::position(f64::INFINITY, 0.0)
            .validate()
            .is_err());
        assert!(TransformUpdate::position(-5000.0, 9000.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let json = serde_json::to_string(&TransformUpdate::scale(1.5)).unwrap();
        assert_eq!(json, r#"{"scale":1.5}"#);
        let parsed: TransformUpdate = serde_json::from_str(r#"{"x":4}"#).unwrap();
        assert_eq!(parsed.x, Some(4.0));
        assert!(parsed.y.is_none());
    }

    #[test]
    fn test_sort_and_next_order() {
        let mut images = vec![
            ImageItem::new("p", upload(), 2),
            ImageItem::new("p", upload(), 0),
            ImageItem::new("p", upload(), 1),
        ];
        sort_by_order(&mut images);
        let orders: Vec<u32> = images.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(next_order(&images), 3);

        images.remove(0);
        assert_eq!(next_order(&images), 3);
        assert_eq!(next_order(&[]), 0);
    }

    #[test]
    fn test_next_order_saturates_at_max() {
        let images = vec![ImageItem::new("p", upload(), u32::MAX)];
        assert_eq!(next_order(&images), u32::MAX);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let image = ImageItem::new("p", upload(), 0);
        let debug = format!("{image:?}");
        assert!(debug.contains("bytes: 3"));
    }
}
