//! Error types shared across SizeSnapper crates.

use std::fmt;

/// The kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Project,
    Image,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Project => f.write_str("project"),
            RecordKind::Image => f.write_str("image"),
        }
    }
}

/// Top-level error type for SizeSnapper operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapperError {
    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Failed to decode {file_name}: {message}")]
    Decode { file_name: String, message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Store is closed")]
    StoreClosed,

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("An export is already in progress")]
    ExportBusy,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SnapperError.
pub type SnapperResult<T> = Result<T, SnapperError>;

impl SnapperError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn decode(file_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            file_name: file_name.into(),
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Project,
            id: id.into(),
        }
    }

    pub fn image_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Image,
            id: id.into(),
        }
    }

    /// Whether this error is a missing-record outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_kind() {
        let err = SnapperError::project_not_found("abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "project not found: abc");
    }

    #[test]
    fn test_decode_message_names_file() {
        let err = SnapperError::decode("cat.jpg", "bad header");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("cat.jpg"));
    }
}
