//! Error types for the sync orchestrator.

use memory_corpus::CorpusError;
use memory_embeddings::EmbeddingError;
use memory_storage::StorageError;
use memory_vector::VectorError;
use thiserror::Error;

/// Errors that can abort a sync pass
#[derive(Error, Debug)]
pub enum SyncError {
    /// Corpus could not be scanned or read
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store error
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// Persistence failed after the new store was published
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The pass ran past its deadline and was abandoned
    #[error("Sync pass exceeded its {limit_secs}s deadline after {chunks_done} chunks")]
    DeadlineExceeded { limit_secs: u64, chunks_done: usize },

    /// Blocking worker failed
    #[error("Sync task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::DeadlineExceeded {
            limit_secs: 600,
            chunks_done: 12,
        };
        assert_eq!(
            err.to_string(),
            "Sync pass exceeded its 600s deadline after 12 chunks"
        );

        let err = SyncError::Task("panicked".to_string());
        assert_eq!(err.to_string(), "Sync task failed: panicked");
    }
}
