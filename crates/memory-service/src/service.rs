//! Memory service.
//!
//! Owns the shared store and the sync orchestrator and exposes the entry
//! points collaborators use: `retrieve`, `sync` and `add_personal`, plus
//! seeding and status.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use memory_corpus::{Chunker, DocumentSource, Segmenter};
use memory_embeddings::{Embedding, EmbeddingModel};
use memory_indexing::{SyncConfig, SyncOrchestrator, SyncReport};
use memory_storage::{LoadOutcome, MemoryPersistence, SnapshotPersistence};
use memory_types::{Origin, Settings};
use memory_vector::{SharedStore, VectorMemoryStore};

use crate::error::ServiceError;
use crate::retrieval::{RetrievalMetrics, RetrievalMetricsSnapshot};

/// Service tunables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Default number of memories returned by a query
    pub top_k: usize,
    /// Upper bound on a single embedding call
    pub embed_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

impl ServiceConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: settings.top_k,
            embed_timeout: Duration::from_secs(settings.embedding.timeout_secs),
        }
    }
}

/// How the memory file looked at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loaded { records: usize },
    Absent,
    Corrupt { reason: String },
}

/// Outcome of the most recent sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LastSync {
    pub finished_at: DateTime<Utc>,
    pub result: Result<SyncReport, String>,
}

/// Point-in-time view of the service.
#[derive(Debug, Clone)]
pub struct MemoryStatus {
    pub records: usize,
    pub personal: usize,
    pub corpus: usize,
    pub tracked_files: usize,
    pub dimension: usize,
    pub model: String,
    pub load: LoadState,
    pub last_sync: Option<LastSync>,
    pub retrieval: RetrievalMetricsSnapshot,
}

/// The semantic memory engine.
pub struct MemoryService {
    pub(crate) store: SharedStore,
    pub(crate) orchestrator: Arc<SyncOrchestrator>,
    pub(crate) embedder: Arc<dyn EmbeddingModel>,
    pub(crate) config: ServiceConfig,
    pub(crate) metrics: RetrievalMetrics,
    load_state: LoadState,
    last_sync: Mutex<Option<LastSync>>,
}

impl MemoryService {
    /// Assemble a service around an already loaded store.
    pub fn new(
        store: VectorMemoryStore,
        orchestrator: Arc<SyncOrchestrator>,
        embedder: Arc<dyn EmbeddingModel>,
        config: ServiceConfig,
    ) -> Self {
        orchestrator.reconcile(&store);
        let records = store.size();
        Self {
            store: SharedStore::new(store),
            orchestrator,
            embedder,
            config,
            metrics: RetrievalMetrics::default(),
            load_state: LoadState::Loaded { records },
            last_sync: Mutex::new(None),
        }
    }

    /// Build the service from settings, loading persisted memory.
    ///
    /// A missing or corrupt memory file starts the service empty. A corrupt
    /// file is left on disk for recovery.
    pub fn load(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingModel>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Self {
        let dimension = embedder.info().dimension;
        if dimension != settings.embedding.dimension {
            warn!(
                configured = settings.embedding.dimension,
                model = dimension,
                "Configured embedding dimension differs from the model, using the model's"
            );
        }

        let memory = MemoryPersistence::new(settings.memory_path(), settings.backup_path(), dimension)
            .with_retention(settings.backup_retention);
        let snapshots = SnapshotPersistence::new(settings.snapshot_path());

        let (store, load_state) = match memory.load() {
            LoadOutcome::Loaded(store) => {
                let records = store.size();
                (store, LoadState::Loaded { records })
            }
            LoadOutcome::Absent => (VectorMemoryStore::new(dimension), LoadState::Absent),
            LoadOutcome::Corrupt { reason } => {
                (VectorMemoryStore::new(dimension), LoadState::Corrupt { reason })
            }
        };

        let source = DocumentSource::new(settings.corpus_root(), settings.corpus.extensions.clone());
        let chunker = Chunker::new(settings.corpus.chunk_sentences, segmenter);
        let sync_config = SyncConfig {
            pass_timeout: match settings.sync.pass_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            ..SyncConfig::default()
        };

        let orchestrator = Arc::new(SyncOrchestrator::new(
            source,
            chunker,
            embedder.clone(),
            memory,
            snapshots,
            sync_config,
        ));

        let mut service = Self::new(store, orchestrator, embedder, ServiceConfig::from_settings(settings));
        service.load_state = load_state;
        service
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn source(&self) -> &DocumentSource {
        self.orchestrator.source()
    }

    pub fn persistence(&self) -> &MemoryPersistence {
        self.orchestrator.memory()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Embed one text on a blocking thread, bounded by the embed timeout.
    pub(crate) async fn embed(&self, text: &str) -> Result<Embedding, ServiceError> {
        let embedder = self.embedder.clone();
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));

        match tokio::time::timeout(self.config.embed_timeout, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(ServiceError::EmbeddingTimeout(self.config.embed_timeout.as_secs())),
        }
    }

    /// Run one sync pass and return the number of corpus chunks added.
    pub async fn sync(&self) -> Result<usize, ServiceError> {
        Ok(self.sync_report().await?.chunks_added)
    }

    /// Run one sync pass and return its full report.
    pub async fn sync_report(&self) -> Result<SyncReport, ServiceError> {
        let result = self.orchestrator.sync(&self.store).await;
        let last = LastSync {
            finished_at: Utc::now(),
            result: result.as_ref().map(Clone::clone).map_err(|e| e.to_string()),
        };
        *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner) = Some(last);
        Ok(result?)
    }

    /// Embed `text` and append it as a personal record, then persist.
    pub async fn add_personal(&self, text: &str) -> Result<(), ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::InvalidInput("memory text is empty".to_string()));
        }

        let embedding = self.embed(text).await?;

        let writer = self.store.write().await;
        let (_, published) =
            writer.update(|store| store.add(text, &embedding.values, Origin::Personal))?;
        self.persist(published).await?;

        info!(chars = text.len(), "Personal memory added");
        Ok(())
    }

    /// Add each sentence run of `text` as a personal record unless an
    /// identical record already exists. Returns how many were added.
    pub async fn seed_personal(&self, text: &str) -> Result<usize, ServiceError> {
        let windows = self.orchestrator.chunker().windows(text);
        if windows.is_empty() {
            return Ok(0);
        }

        let writer = self.store.write().await;
        let current = writer.current();
        let mut fresh: Vec<(String, Embedding)> = Vec::new();
        for window in windows {
            if current.contains_text(&window) || fresh.iter().any(|(t, _)| *t == window) {
                debug!("Seed text already stored");
                continue;
            }
            let embedding = self.embed(&window).await?;
            fresh.push((window, embedding));
        }

        if fresh.is_empty() {
            return Ok(0);
        }

        let added = fresh.len();
        let (_, published) = writer.update(|store| {
            for (text, embedding) in &fresh {
                store.add(text.as_str(), &embedding.values, Origin::Personal)?;
            }
            Ok(())
        })?;
        self.persist(published).await?;

        info!(added, "Seeded personal memory");
        Ok(added)
    }

    /// Write `store` to disk. Callers hold the writer lock.
    async fn persist(&self, store: Arc<VectorMemoryStore>) -> Result<(), ServiceError> {
        let memory = self.orchestrator.memory().clone();
        tokio::task::spawn_blocking(move || memory.save(&store)).await??;
        Ok(())
    }

    pub fn status(&self) -> MemoryStatus {
        let store = self.store.snapshot();
        MemoryStatus {
            records: store.size(),
            personal: store.count_by_origin(Origin::Personal),
            corpus: store.count_by_origin(Origin::Corpus),
            tracked_files: self.orchestrator.tracked_files(),
            dimension: store.dimension(),
            model: self.embedder.info().name.clone(),
            load: self.load_state.clone(),
            last_sync: self
                .last_sync
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            retrieval: self.metrics.snapshot(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use memory_corpus::UnicodeSegmenter;
    use memory_embeddings::{EmbeddingError, ModelInfo};
    use std::path::Path;
    use tempfile::TempDir;

    /// Three-dimensional embedder keyed on a few words.
    pub(crate) struct WordEmbedder {
        info: ModelInfo,
        pub(crate) delay: Option<Duration>,
    }

    impl WordEmbedder {
        pub(crate) fn new() -> Self {
            Self {
                info: ModelInfo {
                    name: "words".to_string(),
                    dimension: 3,
                    max_sequence_length: 128,
                },
                delay: None,
            }
        }
    }

    impl EmbeddingModel for WordEmbedder {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let lower = text.to_lowercase();
            let hit = |w: &str| if lower.contains(w) { 1.0 } else { 0.0 };
            Ok(Embedding::new(vec![hit("tea"), hit("rust"), 0.1]))
        }
    }

    pub(crate) fn settings(root: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.data_dir = root.join("data").to_string_lossy().to_string();
        settings.corpus.root = root.join("vault").to_string_lossy().to_string();
        settings.corpus.extensions = vec!["md".to_string()];
        settings.embedding.dimension = 3;
        settings.embedding.timeout_secs = 5;
        std::fs::create_dir_all(root.join("vault")).unwrap();
        settings
    }

    pub(crate) fn service(root: &Path, embedder: WordEmbedder) -> MemoryService {
        MemoryService::load(&settings(root), Arc::new(embedder), Arc::new(UnicodeSegmenter))
    }

    #[tokio::test]
    async fn test_load_fresh_is_absent() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), WordEmbedder::new());
        let status = service.status();
        assert_eq!(status.load, LoadState::Absent);
        assert_eq!(status.records, 0);
        assert_eq!(status.dimension, 3);
        assert_eq!(status.model, "words");
    }

    #[tokio::test]
    async fn test_add_personal_persists() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), WordEmbedder::new());
        service.add_personal("  I drink green tea  ").await.unwrap();

        let reloaded = MemoryService::load(
            &settings(temp.path()),
            Arc::new(WordEmbedder::new()),
            Arc::new(UnicodeSegmenter),
        );
        let status = reloaded.status();
        assert_eq!(status.load, LoadState::Loaded { records: 1 });
        assert_eq!(status.personal, 1);
        assert!(reloaded.store().snapshot().contains_text("I drink green tea"));
    }

    #[tokio::test]
    async fn test_add_personal_rejects_empty() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), WordEmbedder::new());
        assert!(matches!(
            service.add_personal("   ").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_skips_existing_text() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), WordEmbedder::new());
        let seed = "My name is Sam. I like tea.";

        assert_eq!(service.seed_personal(seed).await.unwrap(), 1);
        assert_eq!(service.seed_personal(seed).await.unwrap(), 0);
        assert_eq!(service.status().personal, 1);
    }

    #[tokio::test]
    async fn test_sync_records_last_outcome() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("vault")).unwrap();
        std::fs::write(temp.path().join("vault/Tea.md"), "Tea is good. Rust is fast.").unwrap();

        let service = service(temp.path(), WordEmbedder::new());
        assert_eq!(service.sync().await.unwrap(), 1);

        let status = service.status();
        assert_eq!(status.corpus, 1);
        assert_eq!(status.tracked_files, 1);
        let last = status.last_sync.unwrap();
        assert_eq!(last.result.unwrap().chunks_added, 1);
    }

    #[tokio::test]
    async fn test_failed_sync_is_recorded() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path(), WordEmbedder::new());
        std::fs::remove_dir_all(temp.path().join("vault")).unwrap();

        assert!(matches!(service.sync().await, Err(ServiceError::Sync(_))));
        assert!(service.status().last_sync.unwrap().result.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_memory_starts_empty() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path());
        std::fs::create_dir_all(settings.data_path()).unwrap();
        std::fs::write(settings.memory_path(), "not json").unwrap();

        let service = MemoryService::load(
            &settings,
            Arc::new(WordEmbedder::new()),
            Arc::new(UnicodeSegmenter),
        );
        assert!(matches!(service.status().load, LoadState::Corrupt { .. }));
        assert_eq!(service.status().records, 0);
        assert!(settings.memory_path().exists());
    }
}
