//! Semantic search over book descriptions
//!
//! - `provider`: embedding backends behind one trait
//! - `cache`: SQLite-backed (book id, model) -> vector store
//! - `similarity`: cosine similarity and top-k ranking
//! - `engine`: ties dataset, cache and provider together

pub mod cache;
pub mod engine;
pub mod gemini;
#[cfg(feature = "local-model")]
pub mod local;
pub mod openai;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, EmbeddingCache, FillOptions, FillPlan, FillReport};
pub use engine::{ScoredBook, SemanticSearch};
pub use provider::{build_provider, EmbeddingProvider};
pub use similarity::cosine_similarity;
