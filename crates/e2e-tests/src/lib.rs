//! End-to-end test infrastructure for memory-vault.
//!
//! Provides a shared TestHarness (temp vault + data dir + settings) and a
//! deterministic keyword embedder so scenario tests can run the full
//! vault-to-query pipeline without downloading a model.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memory_corpus::UnicodeSegmenter;
use memory_embeddings::{Embedding, EmbeddingError, EmbeddingModel, ModelInfo};
use memory_service::MemoryService;
use memory_storage::MemoryPersistence;
use memory_types::Settings;

/// Words the keyword embedder knows, one dimension each.
pub const VOCABULARY: &[&str] = &[
    "alpha", "beta", "tea", "rust", "garden", "coffee", "music", "travel",
];

/// Dimension of [`KeywordEmbedder`] vectors (vocabulary plus a bias term).
pub const DIMENSION: usize = VOCABULARY.len() + 1;

/// Deterministic embedder: one dimension per vocabulary word, counting
/// occurrences, plus a small constant so no vector is zero.
///
/// Can be switched into a failing mode and slowed down to exercise error
/// and concurrency paths.
pub struct KeywordEmbedder {
    info: ModelInfo,
    failing: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            info: ModelInfo {
                name: "keyword-test".to_string(),
                dimension: DIMENSION,
                max_sequence_length: 512,
            },
            failing: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every embed call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut values: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        values.push(0.05);
        Embedding::new(values).values
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for KeywordEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Unavailable("keyword model offline".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Embedding::from_normalized(Self::vector_for(text)))
    }
}

/// Shared test harness for E2E tests.
///
/// Owns a temp directory with a `vault/` corpus root and a `data/`
/// directory for the memory file, snapshot and backups.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub vault: PathBuf,
    pub settings: Settings,
    pub embedder: Arc<KeywordEmbedder>,
}

impl TestHarness {
    /// Create a harness with an empty vault.
    pub fn new() -> Self {
        Self::with_embedder(KeywordEmbedder::new())
    }

    pub fn with_embedder(embedder: KeywordEmbedder) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let vault = temp_dir.path().join("vault");
        std::fs::create_dir_all(&vault).expect("Failed to create vault dir");

        let mut settings = Settings::default();
        settings.data_dir = temp_dir.path().join("data").to_string_lossy().to_string();
        settings.corpus.root = vault.to_string_lossy().to_string();
        settings.corpus.extensions = vec!["md".to_string(), "txt".to_string()];
        settings.corpus.chunk_sentences = 5;
        settings.embedding.dimension = DIMENSION;
        settings.embedding.timeout_secs = 5;
        settings.sync.pass_timeout_secs = 0;

        Self {
            _temp_dir: temp_dir,
            vault,
            settings,
            embedder: Arc::new(embedder),
        }
    }

    /// Build a service over the harness files, loading whatever is on disk.
    pub fn service(&self) -> Arc<MemoryService> {
        Arc::new(MemoryService::load(
            &self.settings,
            self.embedder.clone(),
            Arc::new(UnicodeSegmenter),
        ))
    }

    /// Persistence handle for inspecting the memory file directly.
    pub fn persistence(&self) -> MemoryPersistence {
        MemoryPersistence::new(
            self.settings.memory_path(),
            self.settings.backup_path(),
            DIMENSION,
        )
    }

    /// Write a note relative to the vault root, creating parent dirs.
    pub fn write_note(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.vault.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create note dir");
        }
        std::fs::write(&path, content).expect("Failed to write note");
        path
    }

    pub fn remove_note(&self, relative: &str) {
        std::fs::remove_file(self.vault.join(relative)).expect("Failed to remove note");
    }

    pub fn memory_path(&self) -> PathBuf {
        self.settings.memory_path()
    }

    pub fn backup_count(&self) -> usize {
        self.persistence()
            .list_backups()
            .expect("Failed to list backups")
            .len()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw bytes of a file, for "was this rewritten" checks.
pub fn read_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("Failed to read file")
}

/// Stored texts in position order.
pub fn stored_texts(service: &MemoryService) -> Vec<String> {
    service
        .store()
        .snapshot()
        .records()
        .map(|r| r.text.to_string())
        .collect()
}
