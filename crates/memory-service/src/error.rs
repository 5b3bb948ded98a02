//! Service error types.

use memory_corpus::CorpusError;
use memory_embeddings::EmbeddingError;
use memory_indexing::SyncError;
use memory_storage::StorageError;
use memory_vector::VectorError;
use thiserror::Error;

/// Errors returned by caller-invoked service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding timed out after {0}s")]
    EmbeddingTimeout(u64),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Task(err.to_string())
    }
}
