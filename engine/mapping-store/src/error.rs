//! Error types for the mapping store

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mapping store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the mapping store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors while writing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted store could not be read in full; nothing may be written over it
    #[error("Store at {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// No mapping for the requested key
    #[error("No mapping found for {0}")]
    NotFound(String),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a new corruption error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt { path: path.into(), reason: reason.into() }
    }

    /// Create a new not found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create a new backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Whether this error means on-disk data could not be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
