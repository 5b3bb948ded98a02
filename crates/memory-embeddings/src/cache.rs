//! Model file caching.
//!
//! Model weights are fetched from HuggingFace Hub once and kept in a
//! per-repository directory under the user cache dir.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default sentence embedding model
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Files a BERT-style sentence model needs on disk
pub const MODEL_FILES: &[&str] = &[CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE];

/// Where model files are cached and which repository they come from.
#[derive(Debug, Clone)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::for_repo(DEFAULT_MODEL_REPO)
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Cache for `repo_id` under the platform cache directory.
    pub fn for_repo(repo_id: impl Into<String>) -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("memory-vault")
            .join("models");
        Self::new(cache_dir, repo_id)
    }

    /// `owner/name` becomes `owner_name` so each repo gets one flat directory.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    pub fn is_cached(&self) -> bool {
        let dir = self.model_dir();
        MODEL_FILES.iter().all(|f| dir.join(f).is_file())
    }

    pub fn paths(&self) -> ModelPaths {
        let dir = self.model_dir();
        ModelPaths {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        }
    }
}

/// Paths to model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Return the cached model files, downloading any that are missing.
pub fn ensure_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    if cache.is_cached() {
        debug!(path = ?cache.model_dir(), "Using cached model");
        return Ok(cache.paths());
    }

    use hf_hub::api::sync::Api;

    info!(repo = %cache.repo_id, "Downloading embedding model");
    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());

    let dir = cache.model_dir();
    std::fs::create_dir_all(&dir)?;

    for name in MODEL_FILES {
        let fetched = repo
            .get(name)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", name, e)))?;
        std::fs::copy(&fetched, dir.join(name))?;
        debug!(file = name, "Cached model file");
    }

    Ok(cache.paths())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_cache_location() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.to_string_lossy().contains("memory-vault"));
        assert_eq!(cache.repo_id, DEFAULT_MODEL_REPO);
    }

    #[test]
    fn test_model_dir_flattens_repo() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "owner/model");
        assert_eq!(cache.model_dir(), temp.path().join("owner_model"));
        assert!(!cache.is_cached());
    }

    #[test]
    fn test_is_cached_when_all_files_present() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "owner/model");
        std::fs::create_dir_all(cache.model_dir()).unwrap();
        for name in MODEL_FILES {
            std::fs::write(cache.model_dir().join(name), b"x").unwrap();
        }
        assert!(cache.is_cached());
        assert_eq!(cache.paths().weights, cache.model_dir().join(WEIGHTS_FILE));
    }
}
