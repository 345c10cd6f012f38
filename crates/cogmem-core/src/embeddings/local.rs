//! Local semantic embeddings via fastembed (ONNX-based, fully local).
//!
//! Ships as a concrete [`crate::encoder::Encoder`] implementation. The
//! `embeddings` feature is on by default, matching the teacher's choice
//! to depend on a real local model rather than a remote API.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

use crate::encoder::{normalize, Encoder};
use crate::error::{EngineError, Result};

/// Embedding dimensions after Matryoshka truncation (768 → 256): 3x
/// storage savings with only ~2% quality loss on MTEB benchmarks.
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Maximum text length for embedding (truncated if longer).
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Batch size for efficient embedding generation.
pub const BATCH_SIZE: usize = 32;

static EMBEDDING_MODEL_RESULT: OnceLock<std::result::Result<Mutex<TextEmbedding>, String>> =
    OnceLock::new();

fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("COGMEM_FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "cogmem", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/cogmem/fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> std::result::Result<std::sync::MutexGuard<'static, TextEmbedding>, String> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = get_cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("failed to create embedding cache dir {:?}: {}", cache_dir, e);
        }

        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(true)
            .with_cache_dir(cache_dir);

        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize nomic-embed-text-v1.5: {e}"))
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| format!("embedding model lock poisoned: {e}")),
        Err(err) => Err(err.clone()),
    }
}

/// Apply Matryoshka truncation: truncate to [`EMBEDDING_DIMENSIONS`] and
/// L2-normalize. Nomic Embed v1.5 supports Matryoshka Representation
/// Learning, so the first N dimensions of the 768-dim output are
/// themselves a valid N-dimensional embedding.
#[inline]
pub fn matryoshka_truncate(mut vector: Vec<f32>) -> Vec<f32> {
    if vector.len() > EMBEDDING_DIMENSIONS {
        vector.truncate(EMBEDDING_DIMENSIONS);
    }
    normalize(&mut vector);
    vector
}

/// Wraps fastembed's local ONNX inference as an [`Encoder`].
pub struct FastEmbedEncoder {
    dimension: usize,
}

impl FastEmbedEncoder {
    pub fn new() -> Self {
        Self {
            dimension: EMBEDDING_DIMENSIONS,
        }
    }

    /// Forces model initialization (which may download weights) and
    /// surfaces any failure immediately rather than on first `encode`.
    pub fn warm_up(&self) -> Result<()> {
        get_model()
            .map(|_| ())
            .map_err(EngineError::Encoder)
    }
}

impl Default for FastEmbedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for FastEmbedEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let truncated = if text.len() > MAX_TEXT_LENGTH {
            &text[..MAX_TEXT_LENGTH]
        } else {
            text
        };

        let mut model = get_model().map_err(EngineError::Encoder)?;
        let embeddings = model
            .embed(vec![truncated], None)
            .map_err(|e| EngineError::Encoder(e.to_string()))?;

        let raw = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Encoder("no embedding generated".to_string()))?;

        Ok(matryoshka_truncate(raw))
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = get_model().map_err(EngineError::Encoder)?;
        let mut all = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let truncated: Vec<&str> = chunk
                .iter()
                .map(|t| {
                    if t.len() > MAX_TEXT_LENGTH {
                        &t[..MAX_TEXT_LENGTH]
                    } else {
                        t.as_str()
                    }
                })
                .collect();

            let embeddings = model
                .embed(truncated, None)
                .map_err(|e| EngineError::Encoder(e.to_string()))?;

            for emb in embeddings {
                all.push(matryoshka_truncate(emb));
            }
        }

        Ok(all)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }
}
