//! OpenAI-compatible `/embeddings` client (LM Studio, llama.cpp server)

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::provider::{check_batch, EmbeddingProvider};
use crate::error::{Error, Result};

pub struct OpenAiCompatEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    model_id: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiCompatEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<&str>, model_id: String) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.map(String::from),
            model_id,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut req = self.client.post(&self.endpoint).json(&EmbeddingsRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().map_err(|e| {
            let msg = format!("cannot reach {}: {}", self.endpoint, e);
            if e.is_connect() || e.is_timeout() {
                Error::ProviderUnreachable(msg)
            } else {
                Error::ProviderUnavailable(msg)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::ProviderUnavailable(format!(
                "{} returned {}: {}",
                self.endpoint,
                status,
                body.trim()
            )));
        }

        let mut parsed: EmbeddingsResponse = resp
            .json()
            .map_err(|e| Error::ProviderUnavailable(format!("malformed response: {}", e)))?;

        // Servers may return items out of order; `index` is authoritative when present
        if parsed.data.iter().all(|d| d.index.is_some()) {
            parsed.data.sort_by_key(|d| d.index);
        }

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        check_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

impl EmbeddingProvider for OpenAiCompatEmbedder {
    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| Error::ProviderUnavailable("no embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let embedder =
            OpenAiCompatEmbedder::new("http://localhost:1234/v1/", "nomic", None, "x".into()).unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:1234/v1/embeddings");
    }

    #[test]
    fn test_unreachable_server() {
        // Port 9 (discard) is closed on any sane test machine
        let embedder =
            OpenAiCompatEmbedder::new("http://127.0.0.1:9/v1", "nomic", None, "x".into()).unwrap();
        let result = embedder.embed("hello");
        assert!(matches!(result, Err(Error::ProviderUnreachable(_))));
    }
}
