//! # memory-types
//!
//! Shared domain types for the memory-vault system.
//!
//! - [`MemoryRecord`] and [`Origin`]: the stored unit of memory
//! - [`Settings`]: layered configuration
//! - [`MemoryError`]: shared error type

pub mod config;
pub mod error;
pub mod record;

pub use config::{CorpusSettings, EmbeddingSettings, Settings, SyncSettings};
pub use error::MemoryError;
pub use record::{MemoryRecord, Origin, CORPUS_HEADER_PREFIX};
