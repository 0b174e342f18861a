//! Semantic search engine - combines dataset, embedding cache and provider

use serde::Serialize;
use std::sync::Arc;

use super::cache::{CacheStats, EmbeddingCache, FillOptions, FillReport};
use super::provider::{build_provider, prepare_text, EmbeddingProvider};
use super::similarity::rank;
use crate::core::book::Book;
use crate::core::dataset::Dataset;
use crate::core::settings::Settings;
use crate::error::{Error, Result};

/// Search result with book metadata and similarity score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredBook {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub rating: Option<f32>,
    pub score: f32,
}

impl From<(&Book, f32)> for ScoredBook {
    fn from((book, score): (&Book, f32)) -> Self {
        Self {
            book_id: book.book_id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            rating: book.rating,
            score,
        }
    }
}

pub struct SemanticSearch {
    settings: Settings,
    dataset: Dataset,
    cache: EmbeddingCache,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl SemanticSearch {
    /// Create the engine; the provider is built lazily on first need
    pub fn new(settings: Settings, dataset: Dataset, cache: EmbeddingCache) -> Self {
        Self {
            settings,
            dataset,
            cache,
            provider: None,
        }
    }

    /// Open the on-disk cache for the configured model
    pub fn open(settings: Settings, dataset: Dataset) -> Result<Self> {
        if !settings.ml_enabled {
            return Err(Error::MlDisabled);
        }
        let cache = EmbeddingCache::open(&settings.cache_path(), &settings.model_id())?;
        Ok(Self::new(settings, dataset, cache))
    }

    /// Use an already constructed provider
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        if provider.model_id() != self.cache.model_id() {
            tracing::warn!(
                "provider model {} differs from cache model {}",
                provider.model_id(),
                self.cache.model_id()
            );
        }
        self.provider = Some(provider);
        self
    }

    fn check_enabled(&self) -> Result<()> {
        if self.settings.ml_enabled {
            Ok(())
        } else {
            Err(Error::MlDisabled)
        }
    }

    /// Ensure provider is built
    fn ensure_provider(&mut self) -> Result<Arc<dyn EmbeddingProvider>> {
        self.check_enabled()?;
        if let Some(ref provider) = self.provider {
            return Ok(Arc::clone(provider));
        }
        let provider = build_provider(&self.settings)?;
        self.provider = Some(Arc::clone(&provider));
        Ok(provider)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Cold start: embed every book missing from the cache
    pub fn ensure_all(&mut self) -> Result<FillReport> {
        self.check_enabled()?;

        let options = FillOptions::from(&self.settings);
        let plan = self.cache.plan_fill(self.dataset.books(), &options);
        if plan.is_empty() {
            // Nothing missing, so the provider is never built
            return Ok(plan.into_report());
        }
        tracing::info!("{} books need embeddings", plan.pending());

        let provider = self.ensure_provider()?;
        self.cache.fill(plan, provider.as_ref(), &options)
    }

    /// Vector of a dataset book, computed on a cache miss
    pub fn embedding_for(&mut self, book_id: &str) -> Result<Option<Vec<f32>>> {
        self.check_enabled()?;

        if let Some(vector) = self.cache.get(book_id) {
            return Ok(Some(vector.to_vec()));
        }
        let Some(book) = self.dataset.get(book_id) else {
            return Ok(None);
        };
        let Some(text) = book.embedding_text(self.settings.text_column) else {
            return Ok(None);
        };
        let text = prepare_text(&text, self.settings.lowercase_text);

        let provider = self.ensure_provider()?;
        self.cache
            .get_or_compute(book_id, &text, provider.as_ref())
            .map(Some)
    }

    /// Rank cached books by cosine similarity to the query text
    pub fn search(&mut self, query: &str, k: usize) -> Result<Vec<ScoredBook>> {
        self.check_enabled()?;

        if k == 0 || self.cache.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.ensure_provider()?;
        let query_embedding = provider.embed(&prepare_text(query, self.settings.lowercase_text))?;

        Ok(self.rank_cached(&query_embedding, k, None))
    }

    /// Books most similar to a given book, excluding the book itself
    pub fn similar_to(&self, book_id: &str, k: usize) -> Result<Vec<ScoredBook>> {
        self.check_enabled()?;

        let Some(vector) = self.cache.get(book_id) else {
            return Ok(Vec::new());
        };
        Ok(self.rank_cached(vector, k, Some(book_id)))
    }

    fn rank_cached(&self, query: &[f32], k: usize, exclude: Option<&str>) -> Vec<ScoredBook> {
        let candidates = self
            .dataset
            .books()
            .iter()
            .filter(|b| exclude != Some(b.book_id.as_str()))
            .filter_map(|b| self.cache.get(&b.book_id).map(|v| (b, v)));

        rank(query, candidates, k)
            .into_iter()
            .map(ScoredBook::from)
            .collect()
    }

    /// Drop the active model's vectors
    pub fn rebuild_cache(&mut self) -> Result<usize> {
        self.check_enabled()?;
        self.cache.rebuild()
    }

    pub fn get_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }
}
