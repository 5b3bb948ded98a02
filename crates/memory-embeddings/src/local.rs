//! Local sentence embedder backed by Candle.
//!
//! Runs a BERT-style sentence model (all-MiniLM-L6-v2 by default) on the
//! CPU and mean-pools token states into one unit vector per text.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::{ensure_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Longest token sequence fed to the model; longer inputs are truncated.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Sentence embedder running entirely in-process.
pub struct LocalEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

impl LocalEmbedder {
    /// Load the model for `cache.repo_id`, downloading it on first use.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = ensure_model(cache)?;
        let name = cache
            .repo_id
            .rsplit('/')
            .next()
            .unwrap_or(&cache.repo_id)
            .to_string();
        Self::from_files(name, &paths.config, &paths.tokenizer, &paths.weights)
    }

    pub fn from_files(
        name: String,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;

        let raw = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&raw)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("invalid config: {}", e)))?;
        let dimension = hidden_size(&raw)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        // SAFETY: the weights file is owned by our cache dir and not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        info!(model = %name, dim = dimension, "Embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info: ModelInfo {
                name,
                dimension,
                max_sequence_length: MAX_SEQ_LENGTH,
            },
        })
    }

    /// Tokenize and pad a batch to a common length.
    fn encode(&self, texts: &[&str]) -> Result<(Tensor, Tensor), EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let width = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut ids = Vec::with_capacity(texts.len() * width);
        let mut mask = Vec::with_capacity(texts.len() * width);
        for encoding in &encodings {
            let len = encoding.get_ids().len().min(width);
            ids.extend_from_slice(&encoding.get_ids()[..len]);
            mask.extend_from_slice(&encoding.get_attention_mask()[..len]);
            ids.extend(std::iter::repeat_n(0u32, width - len));
            mask.extend(std::iter::repeat_n(0u32, width - len));
        }

        let shape = (texts.len(), width);
        Ok((
            Tensor::from_vec(ids, shape, &self.device)?,
            Tensor::from_vec(mask, shape, &self.device)?,
        ))
    }
}

/// Read `hidden_size` from a model config, which is the output dimension.
fn hidden_size(raw_config: &str) -> Result<usize, EmbeddingError> {
    let value: serde_json::Value = serde_json::from_str(raw_config)
        .map_err(|e| EmbeddingError::ModelNotFound(format!("invalid config: {}", e)))?;
    value
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| EmbeddingError::ModelNotFound("config has no hidden_size".to_string()))
}

/// Average token states, ignoring padding positions.
fn mean_pool(states: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    let mask = mask
        .unsqueeze(2)?
        .broadcast_as(states.shape())?
        .to_dtype(DType::F32)?;
    let summed = states.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

impl EmbeddingModel for LocalEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::Unavailable("model returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (ids, mask) = self.encode(texts)?;
        let token_types = ids.zeros_like()?;
        let states = self.model.forward(&ids, &token_types, Some(&mask))?;
        let pooled: Vec<Vec<f32>> = mean_pool(&states, &mask)?.to_vec2()?;

        debug!(count = pooled.len(), "Embedded batch");
        Ok(pooled.into_iter().map(Embedding::new).collect())
    }
}
