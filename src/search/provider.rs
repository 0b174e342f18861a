//! Embedding provider abstraction
//!
//! One trait, three backends:
//! - `local`: in-process ONNX model (fastembed)
//! - `lmstudio`: OpenAI-compatible server on localhost
//! - `gemini`: hosted Google API, needs an API key

use std::sync::Arc;

use super::gemini::GeminiEmbedder;
use super::openai::OpenAiCompatEmbedder;
use crate::core::settings::{ProviderKind, Settings};
use crate::error::{Error, Result};

/// Turns text into fixed-dimension vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding space this provider produces
    fn model_id(&self) -> String;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts; one vector per input, same order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    fn model_id(&self) -> String {
        (**self).model_id()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Build the provider selected in settings.
///
/// Reads the API key (hosted provider) or loads the local model, so call it
/// once at startup.
pub fn build_provider(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    if !settings.ml_enabled {
        return Err(Error::MlDisabled);
    }

    let model_id = settings.model_id();
    tracing::info!("creating embedding provider {}", model_id);

    match settings.provider {
        ProviderKind::LmStudio => Ok(Arc::new(OpenAiCompatEmbedder::new(
            &settings.lmstudio_url,
            &settings.lmstudio_model,
            Some("lm-studio"),
            model_id,
        )?)),
        ProviderKind::Gemini => {
            let api_key = settings.read_api_key().ok_or_else(|| {
                Error::ProviderUnavailable(format!(
                    "no Gemini API key: set {} or write it to {}",
                    crate::core::settings::API_KEY_ENV,
                    settings.api_key_path().display()
                ))
            })?;
            Ok(Arc::new(GeminiEmbedder::new(
                &settings.gemini_url,
                &settings.gemini_model,
                api_key,
                model_id,
            )?))
        }
        ProviderKind::Local => build_local(settings, model_id),
    }
}

#[cfg(feature = "local-model")]
fn build_local(settings: &Settings, model_id: String) -> Result<Arc<dyn EmbeddingProvider>> {
    let cache_dir = settings
        .cache_path()
        .parent()
        .map(|p| p.join("models"))
        .unwrap_or_else(|| std::path::PathBuf::from("models"));
    Ok(Arc::new(super::local::LocalEmbedder::new(
        settings.local_model,
        cache_dir,
        model_id,
    )?))
}

#[cfg(not(feature = "local-model"))]
fn build_local(settings: &Settings, _model_id: String) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(Error::ModelLoadError(format!(
        "{} requires the `local-model` feature",
        settings.local_model.as_str()
    )))
}

/// Text preprocessing applied identically to books and queries
pub fn prepare_text(text: &str, lowercase: bool) -> String {
    let text = text.trim();
    if lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    }
}

/// Reject responses that do not line up with the request
pub(crate) fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::ProviderUnavailable(format!(
            "malformed response: expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    if vectors.iter().any(Vec::is_empty) {
        return Err(Error::ProviderUnavailable(
            "malformed response: empty embedding".to_string(),
        ));
    }
    Ok(())
}
