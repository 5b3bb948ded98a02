//! Vector store error types.

use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Texts and vectors are not positionally aligned
    #[error("Store is misaligned: {texts} texts, {vectors} vectors, {origins} origins")]
    Misaligned {
        texts: usize,
        vectors: usize,
        origins: usize,
    },
}
