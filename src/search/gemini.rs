//! Google Gemini embeddings API client

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::provider::{check_batch, EmbeddingProvider};
use crate::error::{Error, Result};

/// Upper bound of requests per `batchEmbedContents` call
const MAX_BATCH: usize = 100;

pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    model_id: String,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: String, model_id: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::ProviderUnavailable("empty Gemini API key".to_string()));
        }
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            api_key,
            model_id,
        })
    }

    fn qualified_model(&self) -> String {
        format!("models/{}", self.model)
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> Result<R> {
        let url = format!("{}/models/{}:{}", self.base_url, self.model, method);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .map_err(|e| {
                let msg = format!("cannot reach Gemini API: {}", e);
                if e.is_connect() || e.is_timeout() {
                    Error::ProviderUnreachable(msg)
                } else {
                    Error::ProviderUnavailable(msg)
                }
            })?;

        match resp.status() {
            s if s.is_success() => resp
                .json()
                .map_err(|e| Error::ProviderUnavailable(format!("malformed response: {}", e))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::ProviderUnavailable(
                "Gemini API key rejected".to_string(),
            )),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::ProviderUnavailable(
                "Gemini API rate limit reached".to_string(),
            )),
            status => {
                let body = resp.text().unwrap_or_default();
                Err(Error::ProviderUnavailable(format!(
                    "Gemini API returned {}: {}",
                    status,
                    body.trim()
                )))
            }
        }
    }
}

impl EmbeddingProvider for GeminiEmbedder {
    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.qualified_model();
        let resp: EmbedContentResponse = self.post(
            "embedContent",
            &EmbedContentRequest {
                model: &model,
                content: Content {
                    parts: [Part { text }],
                },
            },
        )?;
        let vectors = vec![resp.embedding.values];
        check_batch(1, &vectors)?;
        Ok(vectors.into_iter().next().unwrap_or_default())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.qualified_model();
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH) {
            let requests = chunk
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &model,
                    content: Content {
                        parts: [Part {
                            text: text.as_str(),
                        }],
                    },
                })
                .collect();
            let resp: BatchEmbedResponse =
                self.post("batchEmbedContents", &BatchEmbedRequest { requests })?;
            let vectors: Vec<Vec<f32>> = resp.embeddings.into_iter().map(|e| e.values).collect();
            check_batch(chunk.len(), &vectors)?;
            out.extend(vectors);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let result = GeminiEmbedder::new("https://example.invalid", "gemini-embedding-001", "  ".into(), "g".into());
        assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    }

    #[test]
    fn test_model_prefix_normalized() {
        let embedder = GeminiEmbedder::new(
            "https://example.invalid/v1beta/",
            "models/gemini-embedding-001",
            "key".into(),
            "g".into(),
        )
        .unwrap();
        assert_eq!(embedder.qualified_model(), "models/gemini-embedding-001");
        assert_eq!(embedder.base_url, "https://example.invalid/v1beta");
    }

    #[test]
    fn test_request_shape() {
        let body = BatchEmbedRequest {
            requests: vec![EmbedContentRequest {
                model: "models/m",
                content: Content {
                    parts: [Part { text: "hi" }],
                },
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [{"model": "models/m", "content": {"parts": [{"text": "hi"}]}}]
            })
        );
    }
}
