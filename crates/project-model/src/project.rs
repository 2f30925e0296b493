//! Project metadata.
//!
//! A project is a named canvas of fixed pixel dimensions. It owns zero or
//! more image layers; the store deletes them together.

use serde::{Deserialize, Serialize};
use sizesnapper_common::clock::{now_millis, EpochMillis};
use sizesnapper_common::error::SnapperError;

/// A persisted project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier (UUID).
    pub id: String,

    /// Human-readable project name.
    pub name: String,

    /// Canvas width in pixels.
    pub canvas_width: u32,

    /// Canvas height in pixels.
    pub canvas_height: u32,

    /// Creation timestamp (epoch ms).
    pub created_at: EpochMillis,

    /// Last modified timestamp (epoch ms).
    pub updated_at: EpochMillis,
}

impl Project {
    /// Create a new project, validating name and canvas dimensions.
    pub fn new(
        name: impl Into<String>,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Result<Self, ProjectError> {
        let name = validate_name(name.into())?;
        validate_dimensions(canvas_width, canvas_height)?;

        let now = now_millis();
        Ok(Self {
            id: new_id(),
            name,
            canvas_width,
            canvas_height,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rename the project.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ProjectError> {
        self.name = validate_name(name.into())?;
        self.touch();
        Ok(())
    }

    /// Change the canvas dimensions. Layer transforms are left untouched.
    pub fn resize(&mut self, canvas_width: u32, canvas_height: u32) -> Result<(), ProjectError> {
        validate_dimensions(canvas_width, canvas_height)?;
        self.canvas_width = canvas_width;
        self.canvas_height = canvas_height;
        self.touch();
        Ok(())
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }

    /// Check a record loaded from elsewhere against the creation rules.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.id.trim().is_empty() {
            return Err(ProjectError::validation("project id must not be empty"));
        }
        validate_name(self.name.clone())?;
        validate_dimensions(self.canvas_width, self.canvas_height)
    }
}

fn validate_name(name: String) -> Result<String, ProjectError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProjectError::validation("project name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_dimensions(width: u32, height: u32) -> Result<(), ProjectError> {
    if width == 0 || height == 0 {
        return Err(ProjectError::validation(format!(
            "canvas dimensions must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Errors raised while building or editing model records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectError {
    #[error("Invalid project: {message}")]
    ValidationError { message: String },

    #[error("Invalid transform: {message}")]
    InvalidTransform { message: String },
}

impl ProjectError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError {
            message: msg.into(),
        }
    }

    pub fn invalid_transform(msg: impl Into<String>) -> Self {
        Self::InvalidTransform {
            message: msg.into(),
        }
    }
}

impl From<ProjectError> for SnapperError {
    fn from(err: ProjectError) -> Self {
        SnapperError::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_creation() {
        let project = Project::new("  Poster ", 1080, 1080).unwrap();
        assert_eq!(project.name, "Poster");
        assert_eq!(project.canvas_width, 1080);
        assert_eq!(project.created_at, project.updated_at);
        assert_eq!(project.id.len(), 36);
    }

    #[test]
    fn test_project_rejects_empty_name() {
        let err = Project::new("   ", 100, 100).unwrap_err();
        assert!(matches!(err, ProjectError::ValidationError { .. }));
    }

    #[test]
    fn test_project_rejects_zero_dimensions() {
        assert!(Project::new("A", 0, 100).is_err());
        assert!(Project::new("A", 100, 0).is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Project::new("A", 1, 1).unwrap();
        let b = Project::new("B", 1, 1).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_rename_and_resize_validate() {
        let mut project = Project::new("A", 10, 10).unwrap();
        assert!(project.rename("").is_err());
        assert_eq!(project.name, "A");

        project.rename("Banner").unwrap();
        project.resize(1500, 500).unwrap();
        assert_eq!(project.name, "Banner");
        assert_eq!((project.canvas_width, project.canvas_height), (1500, 500));
        assert!(project.updated_at >= project.created_at);

        assert!(project.resize(0, 10).is_err());
        assert_eq!(project.canvas_width, 1500);
    }

    #[test]
    fn test_project_serialization() {
        let project = Project::new("Test", 1920, 1080).unwrap();
        let json = serde_json::to_string_pretty(&project).unwrap();
        let parsed: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, project);
    }

    #[test]
    fn test_validate_loaded_record() {
        let mut project = Project::new("Test", 10, 10).unwrap();
        assert!(project.validate().is_ok());
        project.canvas_height = 0;
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_error_converts_to_validation() {
        let err: SnapperError = ProjectError::validation("nope").into();
        assert!(matches!(err, SnapperError::Validation { .. }));
    }
}
