//! Memory service for memory-vault.
//!
//! Provides the entry points the rest of the system calls:
//! - `retrieve` / `recall`: similarity search that never fails
//! - `sync`: one corpus sync pass
//! - `add_personal` / `seed_personal`: user-asserted facts
//! - `status`: counts, last sync and query metrics

pub mod error;
pub mod retrieval;
pub mod service;

pub use error::ServiceError;
pub use retrieval::{Recall, RetrievalMetrics, RetrievalMetricsSnapshot};
pub use service::{LastSync, LoadState, MemoryService, MemoryStatus, ServiceConfig};
