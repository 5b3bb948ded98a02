//! Embedding gateway trait and types.
//!
//! The gateway turns text into a fixed-size unit vector. Everything above
//! this crate treats it as a black box.

use std::sync::Arc;

use crate::error::EmbeddingError;

/// Vector embedding - a normalized float array.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The embedding vector (unit length unless all components are zero)
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding, normalizing to unit length.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self {
                values: values.into_iter().map(|x| x / norm).collect(),
            }
        } else {
            Self { values }
        }
    }

    /// Wrap a vector that is already normalized (e.g. read back from disk).
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Inner product. Equals cosine similarity for unit vectors.
    pub fn dot(&self, other: &[f32]) -> f32 {
        self.values.iter().zip(other).map(|(a, b)| a * b).sum()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
}

/// Trait for embedding gateways.
///
/// Calls are blocking. Implementations must be thread-safe so the same
/// gateway can serve a sync pass and concurrent queries.
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Arc<T> {
    fn info(&self) -> &ModelInfo {
        (**self).info()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        (**self).embed_batch(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_zero_vector_is_left_alone() {
        let emb = Embedding::new(vec![0.0, 0.0, 0.0]);
        assert_eq!(emb.values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dot_of_unit_vectors() {
        let a = Embedding::new(vec![1.0, 0.0]);
        assert!((a.dot(&[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(a.dot(&[0.0, 1.0]).abs() < 0.001);
        assert!((a.dot(&[-1.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_arc_forwards_to_inner_model() {
        struct Fixed(ModelInfo);

        impl EmbeddingModel for Fixed {
            fn info(&self) -> &ModelInfo {
                &self.0
            }

            fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
                Ok(Embedding::new(vec![1.0, 1.0]))
            }
        }

        let model: Arc<dyn EmbeddingModel> = Arc::new(Fixed(ModelInfo {
            name: "fixed".to_string(),
            dimension: 2,
            max_sequence_length: 8,
        }));
        let shared = Arc::new(model);

        assert_eq!(shared.info().name, "fixed");
        let batch = shared.embed_batch(&["a", "b"]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].dimension(), 2);
    }
}
