//! bookscape library
//!
//! Book dataset browsing with cached embedding-based semantic search.
//!
//! # Modules
//!
//! - `core`: settings, dataset loading, browsing and statistics
//! - `search`: embedding providers, embedding cache, similarity search
//! - `error`: shared error type

pub mod core;
pub mod error;
pub mod search;

// Re-exports for convenience
pub use crate::core::book::Book;
pub use crate::core::browse::BrowseQuery;
pub use crate::core::dataset::Dataset;
pub use crate::core::settings::{LocalModel, ProviderKind, Settings, TextColumn};
pub use error::{Error, Result};
pub use search::{EmbeddingCache, EmbeddingProvider, FillReport, ScoredBook, SemanticSearch};
