//! Error types for player linkage

use thiserror::Error;

/// Result type alias for linkage operations
pub type Result<T> = std::result::Result<T, LinkageError>;

/// Errors that can occur while preparing records for matching
///
/// A missing match is never an error; it is reported as an unmatched record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkageError {
    /// Provider record is missing a required field
    #[error("Malformed record {source_id}: {reason}")]
    MalformedRecord { source_id: String, reason: String },

    /// Matcher configuration is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LinkageError {
    /// Create a new malformed record error
    pub fn malformed(source_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { source_id: source_id.to_string(), reason: reason.into() }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
