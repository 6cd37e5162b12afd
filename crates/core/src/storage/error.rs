//! Error types for artifact storage.

use thiserror::Error;

/// Errors that can occur in the artifact store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No artifact under that key.
    #[error("Artifact not found: {key}")]
    NotFound { key: String },

    /// The key contains path components we refuse to touch.
    #[error("Invalid artifact key: {key}")]
    InvalidKey { key: String },

    /// Placing the artifact into durable storage failed.
    #[error("Failed to store artifact {key}: {source}")]
    PutFailed {
        key: String,
        source: std::io::Error,
    },

    /// Any other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn put_failed(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::PutFailed {
            key: key.into(),
            source,
        }
    }
}
