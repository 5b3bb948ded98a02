//! # memory-embeddings
//!
//! Embedding gateway for memory-vault.
//!
//! The rest of the system only sees the [`EmbeddingModel`] trait: text in,
//! unit-length vector out. [`LocalEmbedder`] is the production gateway, a
//! Candle port of all-MiniLM-L6-v2 (384 dimensions) that runs offline after
//! the first model download.

pub mod cache;
pub mod error;
pub mod local;
pub mod model;

pub use cache::{ensure_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use local::LocalEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
