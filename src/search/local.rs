//! In-process embedding model (fastembed / ONNX runtime)
//!
//! Models are downloaded on first use into `<cache dir>/models`.

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

use super::provider::{check_batch, EmbeddingProvider};
use crate::core::settings::LocalModel;
use crate::error::{Error, Result};

/// fastembed's `embed` needs `&mut self`, hence the mutex.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
    model_id: String,
}

impl LocalEmbedder {
    pub fn new(model: LocalModel, cache_dir: PathBuf, model_id: String) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            Error::ModelLoadError(format!("cannot create {}: {}", cache_dir.display(), e))
        })?;

        tracing::info!(
            "loading local model {} ({})",
            model.as_str(),
            model.backend_name()
        );

        let options = InitOptions::new(backend_model(model))
            .with_cache_dir(cache_dir)
            .with_show_download_progress(true);
        let text_embedding = TextEmbedding::try_new(options)
            .map_err(|e| Error::ModelLoadError(format!("{}: {}", model.backend_name(), e)))?;

        Ok(Self {
            model: Mutex::new(text_embedding),
            model_id,
        })
    }
}

fn backend_model(model: LocalModel) -> fastembed::EmbeddingModel {
    match model {
        LocalModel::MiniLm => fastembed::EmbeddingModel::AllMiniLML6V2,
        LocalModel::Gemma300m => fastembed::EmbeddingModel::BGESmallENV15,
        LocalModel::Qwen0_6b => fastembed::EmbeddingModel::GTEBaseENV15,
        LocalModel::Qwen8b => fastembed::EmbeddingModel::GTELargeENV15,
    }
}

impl EmbeddingProvider for LocalEmbedder {
    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| Error::ModelLoadError("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self
            .model
            .lock()
            .map_err(|e| Error::ModelLoadError(format!("model lock poisoned: {}", e)))?;
        let vectors = model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::ModelLoadError(e.to_string()))?;
        check_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }
}
