//! Descriptive statistics over a book list.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::book::Book;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorStats {
    pub author: String,
    pub num_books: usize,
    pub avg_rating: Option<f32>,
}

/// Knobs for [`summarize`]
#[derive(Debug, Clone)]
pub struct StatsOptions {
    pub top_n: usize,
    /// Authors with fewer books are left out of the ranking
    pub min_books: usize,
    /// Only books published in this window count towards the author ranking
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            min_books: 1,
            year_from: None,
            year_to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_books: usize,
    pub rated_books: usize,
    pub avg_rating: Option<f32>,
    pub books_per_year: BTreeMap<i32, usize>,
    pub author_year_from: Option<i32>,
    pub author_year_to: Option<i32>,
    pub top_authors: Vec<AuthorStats>,
    pub top_publishers: Vec<(String, usize)>,
    pub top_genres: Vec<(String, usize)>,
}

impl Summary {
    /// Year with the most books; the earliest wins a tie
    pub fn busiest_year(&self) -> Option<(i32, usize)> {
        self.books_per_year
            .iter()
            .fold(None, |best: Option<(i32, usize)>, (&year, &count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((year, count)),
            })
    }
}

pub fn summarize(books: &[Book], options: &StatsOptions) -> Summary {
    let ratings: Vec<f32> = books.iter().filter_map(|b| b.rating).collect();

    let mut books_per_year = BTreeMap::new();
    for year in books.iter().filter_map(Book::year) {
        *books_per_year.entry(year).or_insert(0) += 1;
    }

    let top_authors = if options.year_from.is_some() || options.year_to.is_some() {
        let start = options.year_from.unwrap_or(i32::MIN);
        let end = options.year_to.unwrap_or(i32::MAX);
        let window = books
            .iter()
            .filter(|b| b.year().is_some_and(|y| (start..=end).contains(&y)));
        top_authors(window, options.top_n, options.min_books)
    } else {
        top_authors(books, options.top_n, options.min_books)
    };

    Summary {
        total_books: books.len(),
        rated_books: ratings.len(),
        avg_rating: mean(&ratings),
        books_per_year,
        author_year_from: options.year_from,
        author_year_to: options.year_to,
        top_authors,
        top_publishers: top_publishers(books, options.top_n),
        top_genres: top_genres(books, options.top_n),
    }
}

/// Authors with at least `min_books` books, most prolific first
pub fn top_authors<'a>(
    books: impl IntoIterator<Item = &'a Book>,
    top_n: usize,
    min_books: usize,
) -> Vec<AuthorStats> {
    let mut by_author: HashMap<&str, Vec<Option<f32>>> = HashMap::new();
    for book in books {
        if let Some(ref author) = book.author {
            by_author.entry(author.as_str()).or_default().push(book.rating);
        }
    }

    let mut stats: Vec<AuthorStats> = by_author
        .into_iter()
        .filter(|(_, ratings)| ratings.len() >= min_books)
        .map(|(author, ratings)| {
            let rated: Vec<f32> = ratings.iter().flatten().copied().collect();
            AuthorStats {
                author: author.to_string(),
                num_books: ratings.len(),
                avg_rating: mean(&rated),
            }
        })
        .collect();

    stats.sort_by(|a, b| b.num_books.cmp(&a.num_books).then_with(|| a.author.cmp(&b.author)));
    stats.truncate(top_n);
    stats
}

/// Publishers by number of books; blank publishers are ignored
pub fn top_publishers(books: &[Book], top_n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for publisher in books.iter().filter_map(|b| b.publisher.as_deref()) {
        let publisher = publisher.trim();
        if !publisher.is_empty() {
            *counts.entry(publisher).or_insert(0) += 1;
        }
    }

    let mut publishers: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    publishers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    publishers.truncate(top_n);
    publishers
}

pub fn top_genres(books: &[Book], top_n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for genre in books.iter().flat_map(Book::genre_list) {
        *counts.entry(genre).or_insert(0) += 1;
    }

    let mut genres: Vec<(String, usize)> = counts.into_iter().collect();
    genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    genres.truncate(top_n);
    genres
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}
