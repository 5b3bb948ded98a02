//! Corpus error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading the document corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The corpus root does not exist or is not a directory
    #[error("Corpus root not found: {0}")]
    RootMissing(PathBuf),

    /// A document could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CorpusError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }
}
