//! Storage layer error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Written file did not read back as valid content
    #[error("Verification of {path} failed: {reason}")]
    Verification { path: PathBuf, reason: String },

    /// Persisted columns do not form a valid store
    #[error("Invalid store: {0}")]
    InvalidStore(#[from] memory_vector::VectorError),

    /// No usable backup exists
    #[error("No valid backup found in {0}")]
    NoBackup(PathBuf),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
