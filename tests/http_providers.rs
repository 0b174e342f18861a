//! HTTP embedding providers against a mock server.
//!
//! The providers use reqwest's blocking client, which must not run on an
//! async worker thread, so every provider call goes through `spawn_blocking`.

use bookscape::search::gemini::GeminiEmbedder;
use bookscape::search::openai::OpenAiCompatEmbedder;
use bookscape::search::{build_provider, EmbeddingCache};
use bookscape::{Book, Dataset, EmbeddingProvider, Error, SemanticSearch, Settings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

fn lmstudio(base: String) -> OpenAiCompatEmbedder {
    OpenAiCompatEmbedder::new(&base, "nomic", Some("lm-studio"), "lmstudio/nomic".into()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_openai_single_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer lm-studio"))
        .and(body_partial_json(json!({ "model": "nomic", "input": ["space opera"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3] }],
            "model": "nomic"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/v1", server.uri());
    let vector = blocking(move || lmstudio(base).embed("space opera"))
        .await
        .unwrap();

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_openai_batch_follows_index_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        })))
        .mount(&server)
        .await;

    let base = format!("{}/v1", server.uri());
    let vectors = blocking(move || {
        lmstudio(base).embed_batch(&["first".to_string(), "second".to_string()])
    })
    .await
    .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_openai_count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [1.0, 0.0] }]
        })))
        .mount(&server)
        .await;

    let base = format!("{}/v1", server.uri());
    let result =
        blocking(move || lmstudio(base).embed_batch(&["a".to_string(), "b".to_string()])).await;

    assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_openai_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let base = format!("{}/v1", server.uri());
    let result = blocking(move || lmstudio(base).embed("query")).await;

    match result {
        Err(Error::ProviderUnavailable(msg)) => assert!(msg.contains("model not loaded")),
        other => panic!("expected ProviderUnavailable, got {:?}", other.map(|v| v.len())),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_openai_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let base = format!("{}/v1", server.uri());
    let result = blocking(move || lmstudio(base).embed("query")).await;

    assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gemini_embed_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-embedding-001:embedContent"))
        .and(header("x-goog-api-key", "secret"))
        .and(body_partial_json(json!({
            "model": "models/gemini-embedding-001",
            "content": { "parts": [{ "text": "a wizard school" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": [0.5, -0.5] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/v1beta", server.uri());
    let vector = blocking(move || {
        GeminiEmbedder::new(&base, "gemini-embedding-001", "secret".into(), "g".into())?
            .embed("a wizard school")
    })
    .await
    .unwrap();

    assert_eq!(vector, vec![0.5, -0.5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gemini_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-embedding-001:batchEmbedContents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [{ "values": [1.0] }, { "values": [2.0] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/v1beta", server.uri());
    let vectors = blocking(move || {
        GeminiEmbedder::new(&base, "models/gemini-embedding-001", "k".into(), "g".into())?
            .embed_batch(&["one".to_string(), "two".to_string()])
    })
    .await
    .unwrap();

    assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gemini_rejected_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-embedding-001:embedContent"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let base = format!("{}/v1beta", server.uri());
    let result = blocking(move || {
        GeminiEmbedder::new(&base, "gemini-embedding-001", "bad".into(), "g".into())?.embed("x")
    })
    .await;

    match result {
        Err(e @ Error::ProviderUnavailable(_)) => {
            assert!(e.is_recoverable());
            assert!(e.to_string().contains("rejected"));
        }
        other => panic!("expected ProviderUnavailable, got {:?}", other.map(|v| v.len())),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_over_lmstudio() {
    let server = MockServer::start().await;
    // Books embed as a batch, the query as a single input
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({ "input": ["dragons and magic", "rockets and stars"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 0, "embedding": [1.0, 0.0] },
                { "index": 1, "embedding": [0.0, 1.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({ "input": ["spaceships"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1, 0.9] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/v1", server.uri());
    let results = blocking(move || -> bookscape::Result<Vec<String>> {
        let mut settings = Settings::default();
        settings.lmstudio_url = base;

        let mut fantasy = Book::new("1", "Fantasy");
        fantasy.description = Some("dragons and magic".into());
        let mut scifi = Book::new("2", "Sci-fi");
        scifi.description = Some("rockets and stars".into());
        let dataset = Dataset::from_books(vec![fantasy, scifi]);

        let cache = EmbeddingCache::open_in_memory(&settings.model_id())?;
        let provider = build_provider(&settings)?;
        let mut engine = SemanticSearch::new(settings, dataset, cache).with_provider(provider);

        let report = engine.ensure_all()?;
        assert_eq!(report.embedded, 2);

        Ok(engine
            .search("spaceships", 2)?
            .into_iter()
            .map(|r| r.book_id)
            .collect())
    })
    .await
    .unwrap();

    assert_eq!(results, vec!["2".to_string(), "1".to_string()]);
}
