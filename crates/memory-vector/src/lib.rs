//! # memory-vector
//!
//! Positional vector memory store.
//!
//! Records (text, vector, origin) are kept in insertion order next to an
//! exact inner-product index, so position `i` in the text list is always
//! position `i` in the index.
//!
//! ## Features
//! - Exact top-k search, stable on ties
//! - Predicate removal that compacts both halves together
//! - [`SharedStore`]: lock-free reads of published snapshots, single writer

pub mod error;
pub mod index;
pub mod shared;
pub mod store;

pub use error::VectorError;
pub use index::{FlatIndex, SearchResult};
pub use shared::{SharedStore, StoreWriter};
pub use store::{RecordRef, ScoredRecord, StoreParts, VectorMemoryStore};
