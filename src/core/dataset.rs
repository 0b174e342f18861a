//! Book dataset loading.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use super::book::{Book, RawBook, COLUMNS};
use crate::error::{Error, Result};

/// All books, in file order.
///
/// The position of a book in [`Dataset::books`] is its dataset order, used
/// to break ties between equally similar results.
#[derive(Debug, Default)]
pub struct Dataset {
    books: Vec<Book>,
    index: HashMap<String, usize>,
}

impl Dataset {
    /// Load the dataset from a CSV file
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::DatasetLoadError(format!("cannot open {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file)?;
        tracing::info!("loaded {} books from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(false).from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| Error::DatasetLoadError(e.to_string()))?
            .clone();
        let missing: Vec<&str> = COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h.trim() == *col))
            .collect();
        if !missing.is_empty() {
            return Err(Error::DatasetLoadError(format!(
                "missing columns: {}",
                missing.join(", ")
            )));
        }

        let mut books = Vec::new();
        for (row, record) in csv_reader.deserialize::<RawBook>().enumerate() {
            let raw = record.map_err(|e| {
                Error::DatasetLoadError(format!("row {}: {}", row + 1, e))
            })?;
            books.push(Book::from(raw));
        }

        Ok(Self::from_books(books))
    }

    /// Build from records, dropping rows without an id and repeated ids.
    pub fn from_books(books: Vec<Book>) -> Self {
        let mut dataset = Self::default();
        let mut skipped_empty = 0usize;
        let mut skipped_duplicate = 0usize;

        for book in books {
            if book.book_id.is_empty() {
                skipped_empty += 1;
                continue;
            }
            if dataset.index.contains_key(&book.book_id) {
                tracing::debug!("duplicate book id {}", book.book_id);
                skipped_duplicate += 1;
                continue;
            }
            dataset.index.insert(book.book_id.clone(), dataset.books.len());
            dataset.books.push(book);
        }

        if skipped_empty > 0 {
            tracing::warn!("skipped {} rows without bookId", skipped_empty);
        }
        if skipped_duplicate > 0 {
            tracing::warn!("skipped {} rows with a duplicate bookId", skipped_duplicate);
        }

        dataset
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn get(&self, book_id: &str) -> Option<&Book> {
        self.index.get(book_id).map(|&i| &self.books[i])
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
