//! Sync orchestrator.
//!
//! One pass: scan the corpus, diff against the last snapshot and, if
//! anything changed, rebuild the whole corpus segment of the store:
//!
//! 1. Keep every personal record, drop every corpus record
//! 2. Re-read every document (not just the changed ones) and chunk it
//! 3. Embed the chunks and append them as corpus records
//! 4. Publish the rebuilt store in one swap
//! 5. Persist the store, then the corpus snapshot
//!
//! The pass holds the store's writer lock from start to finish, so it
//! serializes with personal inserts and with other passes while readers
//! keep searching the previously published store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use memory_corpus::{ChangeDetector, Chunker, CorpusDiff, CorpusSnapshot, DocumentSource};
use memory_embeddings::EmbeddingModel;
use memory_storage::{MemoryPersistence, SnapshotPersistence};
use memory_types::Origin;
use memory_vector::{SharedStore, VectorMemoryStore};

use crate::error::SyncError;

/// Sync pass configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Abandon a rebuild that runs longer than this. `None` never gives up.
    pub pass_timeout: Option<Duration>,
    /// Chunks sent to the embedder per call.
    pub embed_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pass_timeout: Some(Duration::from_secs(600)),
            embed_batch_size: 16,
        }
    }
}

/// Statistics from one sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub added_files: usize,
    pub modified_files: usize,
    pub deleted_files: usize,
    /// Documents read during the rebuild
    pub documents: usize,
    /// Corpus chunks embedded and stored
    pub chunks_added: usize,
    /// Personal records carried over
    pub personal_kept: usize,
    pub rebuilt: bool,
    pub elapsed_ms: u64,
}

/// Result of the blocking part of a pass.
enum PassOutcome {
    Unchanged,
    Rebuilt {
        store: VectorMemoryStore,
        /// Detector state before this pass
        previous: CorpusSnapshot,
        snapshot: CorpusSnapshot,
        report: SyncReport,
    },
}

/// Keeps the corpus segment of the memory store in step with the vault.
pub struct SyncOrchestrator {
    source: DocumentSource,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingModel>,
    detector: Mutex<ChangeDetector>,
    memory: MemoryPersistence,
    snapshots: SnapshotPersistence,
    config: SyncConfig,
}

impl SyncOrchestrator {
    /// Create an orchestrator, seeding the detector from the snapshot file.
    pub fn new(
        source: DocumentSource,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingModel>,
        memory: MemoryPersistence,
        snapshots: SnapshotPersistence,
        config: SyncConfig,
    ) -> Self {
        let snapshot = snapshots.load_or_default();
        debug!(files = snapshot.len(), "Corpus snapshot loaded");
        Self {
            source,
            chunker,
            embedder,
            detector: Mutex::new(ChangeDetector::new(snapshot)),
            memory,
            snapshots,
            config,
        }
    }

    pub fn source(&self) -> &DocumentSource {
        &self.source
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn memory(&self) -> &MemoryPersistence {
        &self.memory
    }

    /// Number of corpus files in the last scan.
    pub fn tracked_files(&self) -> usize {
        self.detector().snapshot().len()
    }

    fn detector(&self) -> MutexGuard<'_, ChangeDetector> {
        self.detector.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the last scan if `store` holds no corpus records.
    ///
    /// Covers a memory file that was lost or reset while the snapshot file
    /// survived: without this the next pass would see no change and never
    /// repopulate the corpus segment.
    pub fn reconcile(&self, store: &VectorMemoryStore) {
        let mut detector = self.detector();
        if store.count_by_origin(Origin::Corpus) == 0 && !detector.snapshot().is_empty() {
            warn!(
                tracked = detector.snapshot().len(),
                "Memory has no corpus records but the snapshot does, forcing a rebuild"
            );
            detector.restore(CorpusSnapshot::new());
        }
    }

    /// Run one sync pass against `shared`.
    ///
    /// Returns a report whose `chunks_added` is zero when nothing changed.
    /// A failed rebuild publishes nothing and leaves the change to be
    /// detected again next time. A failed save keeps the published store
    /// but also rolls the detector back, so the next pass writes again.
    pub async fn sync(self: &Arc<Self>, shared: &SharedStore) -> Result<SyncReport, SyncError> {
        let writer = shared.write().await;
        let current = writer.current();

        let this = Arc::clone(self);
        let outcome = tokio::task::spawn_blocking(move || this.run_pass(&current)).await??;

        let (store, previous, snapshot, report) = match outcome {
            PassOutcome::Unchanged => return Ok(SyncReport::default()),
            PassOutcome::Rebuilt {
                store,
                previous,
                snapshot,
                report,
            } => (store, previous, snapshot, report),
        };

        let published = writer.replace(store);

        let this = Arc::clone(self);
        let persisted = tokio::task::spawn_blocking(move || -> Result<(), SyncError> {
            this.memory.save(&published)?;
            this.snapshots.save(&snapshot)?;
            Ok(())
        })
        .await
        .map_err(SyncError::from)
        .and_then(|result| result);

        if let Err(e) = persisted {
            warn!(error = %e, "Sync pass not persisted, change will be retried next pass");
            self.detector().restore(previous);
            return Err(e);
        }

        info!(
            added = report.added_files,
            modified = report.modified_files,
            deleted = report.deleted_files,
            documents = report.documents,
            chunks = report.chunks_added,
            personal = report.personal_kept,
            elapsed_ms = report.elapsed_ms,
            "Sync pass rebuilt corpus memory"
        );
        Ok(report)
    }

    /// Detect changes and, if any, build the replacement store.
    fn run_pass(&self, current: &VectorMemoryStore) -> Result<PassOutcome, SyncError> {
        let started = Instant::now();
        let (previous, diff, snapshot) = {
            let mut detector = self.detector();
            let previous = detector.snapshot().clone();
            let diff = detector.detect(&self.source)?;
            (previous, diff, detector.snapshot().clone())
        };

        if diff.is_empty() {
            debug!(files = snapshot.len(), "Corpus unchanged");
            return Ok(PassOutcome::Unchanged);
        }
        log_diff(&diff);

        match self.rebuild(current, started) {
            Ok((store, mut report)) => {
                report.added_files = diff.added.len();
                report.modified_files = diff.modified.len();
                report.deleted_files = diff.deleted.len();
                Ok(PassOutcome::Rebuilt {
                    store,
                    previous,
                    snapshot,
                    report,
                })
            }
            Err(e) => {
                warn!(error = %e, "Rebuild failed, change will be retried next pass");
                self.detector().restore(previous);
                Err(e)
            }
        }
    }

    fn rebuild(
        &self,
        current: &VectorMemoryStore,
        started: Instant,
    ) -> Result<(VectorMemoryStore, SyncReport), SyncError> {
        let mut working = current.retain_origin(Origin::Personal);
        let personal_kept = working.size();

        let documents = self.source.documents()?;
        let chunks: Vec<String> = documents
            .iter()
            .flat_map(|doc| self.chunker.chunk(&doc.body, &doc.title, &doc.file_name()))
            .collect();

        let batch_size = self.config.embed_batch_size.max(1);
        let mut done = 0;
        for batch in chunks.chunks(batch_size) {
            self.check_deadline(started, done)?;
            let texts: Vec<&str> = batch.iter().map(String::as_str).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            for (text, embedding) in batch.iter().zip(embeddings) {
                working.add(text.as_str(), &embedding.values, Origin::Corpus)?;
            }
            done += batch.len();
        }

        Ok((
            working,
            SyncReport {
                documents: documents.len(),
                chunks_added: done,
                personal_kept,
                rebuilt: true,
                elapsed_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            },
        ))
    }

    fn check_deadline(&self, started: Instant, chunks_done: usize) -> Result<(), SyncError> {
        match self.config.pass_timeout {
            Some(limit) if started.elapsed() > limit => Err(SyncError::DeadlineExceeded {
                limit_secs: limit.as_secs(),
                chunks_done,
            }),
            _ => Ok(()),
        }
    }
}

fn log_diff(diff: &CorpusDiff) {
    for path in &diff.added {
        debug!(path = %path, "New document");
    }
    for path in &diff.modified {
        debug!(path = %path, "Modified document");
    }
    for path in &diff.deleted {
        debug!(path = %path, "Deleted document");
    }
    info!(
        added = diff.added.len(),
        modified = diff.modified.len(),
        deleted = diff.deleted.len(),
        "Corpus changed, rebuilding"
    );
}
