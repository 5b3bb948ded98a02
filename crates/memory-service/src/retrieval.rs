//! Retrieval.
//!
//! Never fails toward the caller: an empty store, an embedding error, a
//! timed-out embedding and a search error all degrade to "no memories".

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use memory_types::Origin;
use memory_vector::ScoredRecord;

use crate::service::MemoryService;

/// Counters for query handling.
#[derive(Debug, Default)]
pub struct RetrievalMetrics {
    pub queries: AtomicU64,
    pub empty_store: AtomicU64,
    pub embed_failures: AtomicU64,
    pub search_failures: AtomicU64,
}

impl RetrievalMetrics {
    pub fn snapshot(&self) -> RetrievalMetricsSnapshot {
        RetrievalMetricsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            empty_store: self.empty_store.load(Ordering::Relaxed),
            embed_failures: self.embed_failures.load(Ordering::Relaxed),
            search_failures: self.search_failures.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`RetrievalMetrics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalMetricsSnapshot {
    pub queries: u64,
    pub empty_store: u64,
    pub embed_failures: u64,
    pub search_failures: u64,
}

/// Retrieved memories split by origin, each in rank order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recall {
    pub personal: Vec<String>,
    pub corpus: Vec<String>,
}

impl Recall {
    pub fn is_empty(&self) -> bool {
        self.personal.is_empty() && self.corpus.is_empty()
    }
}

impl MemoryService {
    /// The `k` stored texts most similar to `query`, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        self.search(query, k)
            .await
            .into_iter()
            .map(|hit| hit.text)
            .collect()
    }

    /// Like [`retrieve`](Self::retrieve), grouped by origin.
    pub async fn recall(&self, query: &str, k: usize) -> Recall {
        let mut recall = Recall::default();
        for hit in self.search(query, k).await {
            match hit.origin {
                Origin::Personal => recall.personal.push(hit.text),
                Origin::Corpus => recall.corpus.push(hit.text),
            }
        }
        recall
    }

    async fn search(&self, query: &str, k: usize) -> Vec<ScoredRecord> {
        self.metrics.queries.fetch_add(1, Ordering::Relaxed);

        // Searching a snapshot keeps readers off the writer lock
        let store = self.store.snapshot();
        if store.is_empty() {
            self.metrics.empty_store.fetch_add(1, Ordering::Relaxed);
            debug!("Query against empty memory");
            return Vec::new();
        }

        let embedding = match self.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                self.metrics.embed_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Query embedding failed, returning no memories");
                return Vec::new();
            }
        };

        match store.search(&embedding.values, k) {
            Ok(hits) => {
                debug!(k, results = hits.len(), "Memory query complete");
                hits
            }
            Err(e) => {
                self.metrics.search_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Memory search failed, returning no memories");
                Vec::new()
            }
        }
    }
}
