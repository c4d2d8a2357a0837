//! Error types for Meridian.

use thiserror::Error;

use crate::types::{ElementId, HostId};

/// Main error type for Meridian operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeridianError {
    /// No candidate path (or disjoint pair) survived constraint filtering.
    #[error("No path found between {src} and {dst}")]
    PathNotFound { src: ElementId, dst: ElementId },

    /// Structural failure while turning a path into installable intents.
    #[error("Intent compilation failed: {0}")]
    IntentCompilation(String),

    /// Intent construction or decoding failed.
    #[error("Intent validation failed: {message}")]
    IntentInvalid { key: Option<String>, message: String },

    /// A path was built from an empty or non-contiguous link list.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A link annotation that a constraint adjusts is not numeric.
    #[error("Annotation {key} has non-numeric value {value:?}")]
    InvalidAnnotation { key: String, value: String },

    /// An intent endpoint is not known to the host directory.
    #[error("Host {0} not found")]
    HostNotFound(HostId),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MeridianError {
    /// Returns true if retrying after a topology or constraint change may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MeridianError::PathNotFound { .. })
    }
}

/// Convenience Result type for Meridian operations.
pub type Result<T> = std::result::Result<T, MeridianError>;

impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::SerializationError(err.to_string())
    }
}
