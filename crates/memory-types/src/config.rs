//! Configuration loading for memory-vault.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/memory-vault/config.toml`.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MemoryError;

const APP_NAME: &str = "memory-vault";

/// Document corpus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSettings {
    /// Root directory of the note vault
    #[serde(default = "default_corpus_root")]
    pub root: String,

    /// File extensions (without the dot) recognized as documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Sentences per chunk
    #[serde(default = "default_chunk_sentences")]
    pub chunk_sentences: usize,
}

fn default_corpus_root() -> String {
    "./vault".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "txt".to_string()]
}

fn default_chunk_sentences() -> usize {
    5
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            extensions: default_extensions(),
            chunk_sentences: default_chunk_sentences(),
        }
    }
}

/// Periodic sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between background sync passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds to wait before retrying after a failed pass
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Upper bound for a single rebuild, checked between embeddings
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_retry_backoff_secs() -> u64 {
    60
}

fn default_pass_timeout_secs() -> u64 {
    600
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            pass_timeout_secs: default_pass_timeout_secs(),
        }
    }
}

/// Embedding gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// HuggingFace repository of the sentence embedding model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Embedding dimension produced by the model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Timeout for a single query embedding, in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_repo: default_model_repo(),
            dimension: default_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the memory file, snapshot and backups
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Memory file name (relative paths resolve against `data_dir`)
    #[serde(default = "default_memory_file")]
    pub memory_file: String,

    /// Corpus snapshot file name
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Backup directory name
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// Number of newest backups to keep. `None` keeps every backup.
    #[serde(default)]
    pub backup_retention: Option<usize>,

    /// Number of memories returned by a query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Text seeded as personal memory on startup
    #[serde(default)]
    pub seed_text: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub corpus: CorpusSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

fn default_data_dir() -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_memory_file() -> String {
    "memory_store.json".to_string()
}

fn default_snapshot_file() -> String {
    "corpus_snapshot.json".to_string()
}

fn default_backup_dir() -> String {
    "memory_backups".to_string()
}

fn default_top_k() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            memory_file: default_memory_file(),
            snapshot_file: default_snapshot_file(),
            backup_dir: default_backup_dir(),
            backup_retention: None,
            top_k: default_top_k(),
            seed_text: None,
            log_level: default_log_level(),
            corpus: CorpusSettings::default(),
            sync: SyncSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/memory-vault/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MEMORY_*, `__` separates nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, MemoryError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("data_dir", default_data_dir())?
            .set_default("memory_file", default_memory_file())?
            .set_default("snapshot_file", default_snapshot_file())?
            .set_default("backup_dir", default_backup_dir())?
            .set_default("top_k", default_top_k() as i64)?
            .set_default("log_level", default_log_level())?
            .set_default("corpus.root", default_corpus_root())?
            .set_default("corpus.extensions", default_extensions())?
            .set_default("corpus.chunk_sentences", default_chunk_sentences() as i64)?
            .set_default("sync.interval_secs", default_interval_secs() as i64)?
            .set_default("sync.retry_backoff_secs", default_retry_backoff_secs() as i64)?
            .set_default("sync.pass_timeout_secs", default_pass_timeout_secs() as i64)?
            .set_default("embedding.model_repo", default_model_repo())?
            .set_default("embedding.dimension", default_dimension() as i64)?
            .set_default("embedding.timeout_secs", default_embedding_timeout() as i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MEMORY_TOP_K, MEMORY_CORPUS__ROOT, MEMORY_SYNC__INTERVAL_SECS, ...
        builder = builder.add_source(
            Environment::with_prefix("MEMORY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.corpus.chunk_sentences == 0 {
            return Err(MemoryError::Config(
                "corpus.chunk_sentences must be > 0".to_string(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(MemoryError::Config(
                "sync.interval_secs must be > 0".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(MemoryError::Config(
                "embedding.dimension must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// Full path of the persisted memory file.
    pub fn memory_path(&self) -> PathBuf {
        self.resolve(&self.memory_file)
    }

    /// Full path of the persisted corpus snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.resolve(&self.snapshot_file)
    }

    /// Full path of the backup directory.
    pub fn backup_path(&self) -> PathBuf {
        self.resolve(&self.backup_dir)
    }

    /// Corpus root with `~` expanded.
    pub fn corpus_root(&self) -> PathBuf {
        expand_home(&self.corpus.root)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = expand_home(name);
        if path.is_absolute() {
            path
        } else {
            self.data_path().join(path)
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    Path::new(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.top_k, 8);
        assert_eq!(settings.corpus.chunk_sentences, 5);
        assert_eq!(settings.corpus.extensions, vec!["md", "txt"]);
        assert_eq!(settings.sync.interval_secs, 300);
        assert_eq!(settings.sync.retry_backoff_secs, 60);
        assert_eq!(settings.embedding.dimension, 384);
        assert!(settings.backup_retention.is_none());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.memory_file, "memory_store.json");
    }

    #[test]
    fn test_load_from_cli_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(
            &path,
            "top_k = 3\nbackup_retention = 4\n\n[corpus]\nroot = \"/notes\"\nchunk_sentences = 2\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.backup_retention, Some(4));
        assert_eq!(settings.corpus.root, "/notes");
        assert_eq!(settings.corpus.chunk_sentences, 2);
        // Untouched keys keep their defaults
        assert_eq!(settings.corpus.extensions, vec!["md", "txt"]);
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut settings = Settings::default();
        settings.corpus.chunk_sentences = 0;
        assert!(matches!(settings.validate(), Err(MemoryError::Config(_))));
    }

    #[test]
    fn test_relative_paths_resolve_against_data_dir() {
        let settings = Settings {
            data_dir: "/var/lib/vault".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.memory_path(),
            PathBuf::from("/var/lib/vault/memory_store.json")
        );
        assert_eq!(
            settings.backup_path(),
            PathBuf::from("/var/lib/vault/memory_backups")
        );

        let settings = Settings {
            data_dir: "/var/lib/vault".to_string(),
            snapshot_file: "/tmp/snap.json".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.snapshot_path(), PathBuf::from("/tmp/snap.json"));
    }
}
