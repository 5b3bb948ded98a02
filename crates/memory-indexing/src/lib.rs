//! Corpus sync for memory-vault.
//!
//! This crate keeps the corpus-derived segment of the memory store in step
//! with the note vault.
//!
//! ## Key Components
//!
//! - [`SyncOrchestrator`]: scan, diff, segment rebuild, swap, persist
//! - [`SyncConfig`]: pass deadline and embedding batch size
//! - [`SyncReport`]: what one pass did
//! - [`SyncError`]: why a pass was abandoned
//!
//! ## Rebuild policy
//!
//! Any change to the corpus discards every corpus record and re-chunks the
//! whole vault. Personal records are carried over untouched. An unchanged
//! corpus performs no rebuild and no write.

pub mod error;
pub mod orchestrator;

pub use error::SyncError;
pub use orchestrator::{SyncConfig, SyncOrchestrator, SyncReport};
