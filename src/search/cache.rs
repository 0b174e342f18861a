//! Embedding cache using SQLite
//!
//! One row per (book id, model id), vectors stored as little-endian f32
//! BLOBs. The active model's vectors are loaded into memory on open and
//! every insert is written through, so an interrupted fill keeps its progress.

use rayon::prelude::*;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use super::provider::{prepare_text, EmbeddingProvider};
use crate::core::book::Book;
use crate::core::settings::{Settings, TextColumn};
use crate::error::{Error, Result};

pub struct EmbeddingCache {
    conn: Connection,
    model_id: String,
    vectors: HashMap<String, Vec<f32>>,
}

/// How a bulk fill runs
#[derive(Debug, Clone)]
pub struct FillOptions {
    pub text_column: TextColumn,
    pub lowercase: bool,
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Batches embedded concurrently
    pub parallelism: usize,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            text_column: TextColumn::Description,
            lowercase: false,
            batch_size: 512,
            batch_delay: Duration::ZERO,
            parallelism: 1,
        }
    }
}

impl From<&Settings> for FillOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            text_column: settings.text_column,
            lowercase: settings.lowercase_text,
            batch_size: settings.batch_size,
            batch_delay: settings.batch_delay(),
            parallelism: settings.parallelism,
        }
    }
}

/// Outcome of [`EmbeddingCache::ensure_all`]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FillReport {
    /// Newly embedded and stored
    pub embedded: usize,
    /// Already present before the run
    pub cached: usize,
    /// No text to embed
    pub skipped: usize,
    /// Provider errors, logged and left for the next run
    pub failed: usize,
    pub duration_ms: u128,
}

#[derive(Debug)]
pub struct CacheStats {
    pub model_id: String,
    pub entries: usize,
    /// Entry count for every model present in the database
    pub models: Vec<(String, usize)>,
    pub last_insert: Option<i64>,
}

/// Books selected for embedding by [`EmbeddingCache::plan_fill`]
#[derive(Debug)]
pub struct FillPlan {
    pending: Vec<(String, String)>,
    report: FillReport,
    started: Instant,
}

impl FillPlan {
    /// Number of books that still need a vector
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Report of a plan with nothing to embed
    pub fn into_report(self) -> FillReport {
        FillReport {
            duration_ms: self.started.elapsed().as_millis(),
            ..self.report
        }
    }
}

type Outcome = Vec<(String, Result<Vec<f32>>)>;

impl EmbeddingCache {
    /// Open or create the cache database at path
    pub fn open(db_path: &Path, model_id: &str) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, model_id)
    }

    /// In-memory cache (for testing)
    pub fn open_in_memory(model_id: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, model_id)
    }

    fn with_connection(conn: Connection, model_id: &str) -> Result<Self> {
        let mut cache = Self {
            conn,
            model_id: model_id.to_string(),
            vectors: HashMap::new(),
        };
        cache.init_schema()?;
        cache.load()?;
        tracing::debug!("{} cached embeddings for {}", cache.len(), cache.model_id);
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                book_id TEXT NOT NULL,
                model_id TEXT NOT NULL,
                dim INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (book_id, model_id)
            );

            CREATE TABLE IF NOT EXISTS cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model_id);
            "#,
        )?;
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT book_id, embedding FROM embeddings WHERE model_id = ?1")?;
        let rows = stmt.query_map(params![self.model_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut vectors = HashMap::new();
        for row in rows {
            let (book_id, blob) = row?;
            match blob_to_embedding(&blob) {
                Some(vector) => {
                    vectors.insert(book_id, vector);
                }
                None => tracing::warn!("ignoring corrupt cache entry for {}", book_id),
            }
        }
        drop(stmt);

        self.vectors = vectors;
        Ok(())
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn get(&self, book_id: &str) -> Option<&[f32]> {
        self.vectors.get(book_id).map(Vec::as_slice)
    }

    pub fn contains(&self, book_id: &str) -> bool {
        self.vectors.contains_key(book_id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Store a vector; an existing entry is never overwritten.
    ///
    /// Returns `false` when the book already had one.
    pub fn insert(&mut self, book_id: &str, vector: Vec<f32>) -> Result<bool> {
        if self.contains(book_id) {
            return Ok(false);
        }
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO embeddings (book_id, model_id, dim, embedding, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                book_id,
                self.model_id,
                vector.len() as i64,
                embedding_to_blob(&vector),
                chrono::Utc::now().timestamp(),
            ],
        )?;
        self.vectors.insert(book_id.to_string(), vector);
        Ok(true)
    }

    /// Store several vectors in one transaction
    fn insert_many(&mut self, entries: Vec<(String, Vec<f32>)>) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;
        let mut stored = Vec::with_capacity(entries.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO embeddings (book_id, model_id, dim, embedding, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for (book_id, vector) in entries {
                if self.vectors.contains_key(&book_id) {
                    continue;
                }
                stmt.execute(params![
                    book_id,
                    self.model_id,
                    vector.len() as i64,
                    embedding_to_blob(&vector),
                    now,
                ])?;
                stored.push((book_id, vector));
            }
        }
        tx.commit()?;

        let count = stored.len();
        self.vectors.extend(stored);
        Ok(count)
    }

    /// Cached vector for the book, computing and storing it on a miss
    pub fn get_or_compute(
        &mut self,
        book_id: &str,
        text: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<f32>> {
        if let Some(vector) = self.vectors.get(book_id) {
            return Ok(vector.clone());
        }
        let vector = provider.embed(text)?;
        self.insert(book_id, vector.clone())?;
        Ok(vector)
    }

    /// Embed every book that has text but no cached vector.
    ///
    /// Each finished batch is committed before the next starts, so rerunning
    /// after a failure only embeds what is still missing. Books whose
    /// embedding fails are logged and counted in the report. The run stops
    /// with an error only when a whole wave of batches failed to connect to
    /// the provider.
    pub fn ensure_all(
        &mut self,
        books: &[Book],
        provider: &dyn EmbeddingProvider,
        options: &FillOptions,
    ) -> Result<FillReport> {
        let plan = self.plan_fill(books, options);
        self.fill(plan, provider, options)
    }

    /// Work out which books a fill would embed, without calling a provider
    pub fn plan_fill(&self, books: &[Book], options: &FillOptions) -> FillPlan {
        let mut plan = FillPlan {
            pending: Vec::new(),
            report: FillReport::default(),
            started: Instant::now(),
        };

        let mut seen = HashSet::new();
        for book in books {
            if !seen.insert(book.book_id.as_str()) {
                continue;
            }
            if self.contains(&book.book_id) {
                plan.report.cached += 1;
                continue;
            }
            match book.embedding_text(options.text_column) {
                Some(text) => plan
                    .pending
                    .push((book.book_id.clone(), prepare_text(&text, options.lowercase))),
                None => plan.report.skipped += 1,
            }
        }

        plan
    }

    /// Run a planned fill
    pub fn fill(
        &mut self,
        plan: FillPlan,
        provider: &dyn EmbeddingProvider,
        options: &FillOptions,
    ) -> Result<FillReport> {
        let FillPlan {
            pending,
            mut report,
            started,
        } = plan;

        if pending.is_empty() {
            report.duration_ms = started.elapsed().as_millis();
            return Ok(report);
        }

        let batch_size = options.batch_size.max(1);
        let parallelism = options.parallelism.max(1);
        let batches: Vec<&[(String, String)]> = pending.chunks(batch_size).collect();
        let total_batches = batches.len();
        tracing::info!(
            "embedding {} books in {} batches of up to {}",
            pending.len(),
            total_batches,
            batch_size
        );

        let mut done = 0;
        for wave in batches.chunks(parallelism) {
            let outcomes: Vec<Outcome> = if wave.len() > 1 {
                wave.par_iter().map(|batch| embed_batch(provider, batch)).collect()
            } else {
                wave.iter().map(|batch| embed_batch(provider, batch)).collect()
            };

            let mut wave_embedded = 0;
            let mut wave_failed = 0;
            let mut unreachable = None;
            let mut all_unreachable = true;
            let mut succeeded = Vec::new();
            for (book_id, result) in outcomes.into_iter().flatten() {
                match result {
                    Ok(vector) => {
                        wave_embedded += 1;
                        succeeded.push((book_id, vector));
                    }
                    Err(e) => {
                        tracing::warn!("failed to embed {}: {}", book_id, e);
                        wave_failed += 1;
                        if e.is_unreachable() {
                            unreachable.get_or_insert(e);
                        } else {
                            all_unreachable = false;
                        }
                    }
                }
            }

            report.embedded += self.insert_many(succeeded)?;
            report.failed += wave_failed;
            done += wave.len();
            tracing::info!("batch {}/{} done", done, total_batches);

            // Every book in the wave failed to connect: the provider is down
            if wave_embedded == 0 && all_unreachable {
                if let Some(e) = unreachable {
                    tracing::warn!("provider unreachable, stopping after {} batches", done);
                    self.touch_fill_meta()?;
                    return Err(e);
                }
            }

            if !options.batch_delay.is_zero() && done < total_batches {
                std::thread::sleep(options.batch_delay);
            }
        }

        self.touch_fill_meta()?;
        report.duration_ms = started.elapsed().as_millis();
        tracing::info!(
            "embedded {} books ({} already cached, {} failed)",
            report.embedded,
            report.cached,
            report.failed
        );
        Ok(report)
    }

    fn touch_fill_meta(&self) -> Result<()> {
        self.set_meta(
            &format!("last_fill:{}", self.model_id),
            &chrono::Utc::now().timestamp().to_string(),
        )
    }

    /// Unix time of the last completed or aborted fill for the active model
    pub fn last_fill(&self) -> Result<Option<i64>> {
        Ok(self
            .get_meta(&format!("last_fill:{}", self.model_id))?
            .and_then(|v| v.parse().ok()))
    }

    /// Drop every vector of the active model
    pub fn rebuild(&mut self) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM embeddings WHERE model_id = ?1",
            params![self.model_id],
        )?;
        self.vectors.clear();
        tracing::info!("removed {} cached embeddings for {}", removed, self.model_id);
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut stmt = self.conn.prepare(
            "SELECT model_id, COUNT(*) FROM embeddings GROUP BY model_id ORDER BY model_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut models = Vec::new();
        for row in rows {
            let (model, count) = row?;
            models.push((model, count as usize));
        }

        let last_insert: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(created_at) FROM embeddings WHERE model_id = ?1",
                params![self.model_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(CacheStats {
            model_id: self.model_id.clone(),
            entries: self.len(),
            models,
            last_insert,
        })
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cache_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }
}

/// Embed one batch; on a batch-level error, retry its books one by one so a
/// single bad input does not sink its neighbours.
///
/// When the batch request could not reach the provider, only the first book
/// is retried; if that also fails to connect, the whole batch is marked
/// unreachable without further calls.
fn embed_batch(provider: &dyn EmbeddingProvider, batch: &[(String, String)]) -> Outcome {
    let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
    match provider.embed_batch(&texts) {
        Ok(vectors) if vectors.len() == batch.len() => batch
            .iter()
            .zip(vectors)
            .map(|((book_id, _), vector)| (book_id.clone(), Ok(vector)))
            .collect(),
        Ok(vectors) => {
            tracing::debug!(
                "batch returned {} vectors for {} texts, retrying individually",
                vectors.len(),
                batch.len()
            );
            embed_each(provider, batch)
        }
        Err(e) if batch.len() == 1 => vec![(batch[0].0.clone(), Err(e))],
        Err(e) if e.is_unreachable() => {
            let (first_id, first_text) = &batch[0];
            match provider.embed(first_text) {
                Err(retry) if retry.is_unreachable() => {
                    let msg = match &retry {
                        Error::ProviderUnreachable(m) => m.clone(),
                        other => other.to_string(),
                    };
                    let mut outcome = vec![(first_id.clone(), Err(retry))];
                    outcome.extend(batch[1..].iter().map(|(book_id, _)| {
                        (book_id.clone(), Err(Error::ProviderUnreachable(msg.clone())))
                    }));
                    outcome
                }
                first => {
                    let mut outcome = vec![(first_id.clone(), first)];
                    outcome.extend(embed_each(provider, &batch[1..]));
                    outcome
                }
            }
        }
        Err(e) => {
            tracing::debug!("batch failed ({}), retrying individually", e);
            embed_each(provider, batch)
        }
    }
}

fn embed_each(provider: &dyn EmbeddingProvider, batch: &[(String, String)]) -> Outcome {
    batch
        .iter()
        .map(|(book_id, text)| (book_id.clone(), provider.embed(text)))
        .collect()
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 embedding; `None` if the length is not a multiple of 4
fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_conversion() {
        let embedding = vec![1.0, 2.0, 3.0, -0.5];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob_to_embedding(&blob), Some(embedding));
        assert_eq!(blob_to_embedding(&blob[..5]), None);
        assert_eq!(blob_to_embedding(&[]), None);
    }

    #[test]
    fn test_insert_never_overwrites() -> Result<()> {
        let mut cache = EmbeddingCache::open_in_memory("test/model")?;

        assert!(cache.insert("book-1", vec![1.0, 0.0])?);
        assert!(!cache.insert("book-1", vec![0.0, 1.0])?);
        assert_eq!(cache.get("book-1"), Some(&[1.0, 0.0][..]));
        assert_eq!(cache.len(), 1);

        Ok(())
    }

    #[test]
    fn test_models_are_isolated() -> Result<()> {
        let dir = tempfile::tempdir().map_err(Error::Io)?;
        let path = dir.path().join("embeddings.db");

        {
            let mut cache = EmbeddingCache::open(&path, "model-a")?;
            cache.insert("book-1", vec![1.0, 2.0])?;
        }

        let cache_b = EmbeddingCache::open(&path, "model-b")?;
        assert!(cache_b.is_empty());

        let cache_a = EmbeddingCache::open(&path, "model-a")?;
        assert_eq!(cache_a.get("book-1"), Some(&[1.0, 2.0][..]));

        let stats = cache_b.stats()?;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.models, vec![("model-a".to_string(), 1)]);
        assert_eq!(stats.last_insert, None);

        let stats = cache_a.stats()?;
        assert_eq!(stats.entries, 1);
        assert!(stats.last_insert.is_some_and(|ts| ts > 0));

        Ok(())
    }

    #[test]
    fn test_rebuild_only_clears_active_model() -> Result<()> {
        let dir = tempfile::tempdir().map_err(Error::Io)?;
        let path = dir.path().join("cache/embeddings.db");

        let mut a = EmbeddingCache::open(&path, "model-a")?;
        a.insert("book-1", vec![1.0])?;
        let mut b = EmbeddingCache::open(&path, "model-b")?;
        b.insert("book-1", vec![2.0])?;

        assert_eq!(a.rebuild()?, 1);
        assert!(a.is_empty());

        let b = EmbeddingCache::open(&path, "model-b")?;
        assert_eq!(b.len(), 1);

        Ok(())
    }

    #[test]
    fn test_meta_roundtrip() -> Result<()> {
        let cache = EmbeddingCache::open_in_memory("m")?;
        assert_eq!(cache.get_meta("k")?, None);
        cache.set_meta("k", "v1")?;
        cache.set_meta("k", "v2")?;
        assert_eq!(cache.get_meta("k")?, Some("v2".to_string()));

        assert_eq!(cache.last_fill()?, None);
        cache.touch_fill_meta()?;
        assert!(cache.last_fill()?.is_some());
        Ok(())
    }
}
