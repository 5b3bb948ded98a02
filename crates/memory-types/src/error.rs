//! Error types for the memory-vault system.

use thiserror::Error;

/// Unified error type for shared memory types.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<config::ConfigError> for MemoryError {
    fn from(err: config::ConfigError) -> Self {
        MemoryError::Config(err.to_string())
    }
}
