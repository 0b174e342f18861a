//! Filtering, sorting and paging over the in-memory book list.

use super::book::{normalize_text, normalize_title_for_sort, Book};

/// Browse query; every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct BrowseQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub letter: Option<char>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub min_rating: Option<f32>,
    pub sort_by_title: bool,
}

pub fn search_by_title<'a>(books: &[&'a Book], query: &str) -> Vec<&'a Book> {
    let query = normalize_text(query);
    books
        .iter()
        .copied()
        .filter(|b| normalize_text(&b.title).contains(&query))
        .collect()
}

pub fn filter_by_author<'a>(books: &[&'a Book], query: &str) -> Vec<&'a Book> {
    let query = normalize_text(query);
    books
        .iter()
        .copied()
        .filter(|b| b.author_normalized().contains(&query))
        .collect()
}

/// Books whose sort title starts with `letter`
pub fn filter_by_letter<'a>(books: &[&'a Book], letter: char) -> Vec<&'a Book> {
    let letter = normalize_text(&letter.to_string());
    books
        .iter()
        .copied()
        .filter(|b| normalize_title_for_sort(&b.title).starts_with(&letter))
        .collect()
}

/// Books published within `start..=end`; books without a year are dropped
pub fn filter_by_year_range<'a>(books: &[&'a Book], start: i32, end: i32) -> Vec<&'a Book> {
    books
        .iter()
        .copied()
        .filter(|b| b.year().is_some_and(|y| (start..=end).contains(&y)))
        .collect()
}

/// Stable sort by normalized title
pub fn sort_by_title(books: &mut [&Book]) {
    books.sort_by_cached_key(|b| normalize_title_for_sort(&b.title));
}

/// Apply a full query in one pass over the dataset order
pub fn apply<'a>(books: &'a [Book], query: &BrowseQuery) -> Vec<&'a Book> {
    let mut result: Vec<&Book> = books.iter().collect();

    if let Some(ref title) = query.title {
        result = search_by_title(&result, title);
    }
    if let Some(ref author) = query.author {
        result = filter_by_author(&result, author);
    }
    if let Some(letter) = query.letter {
        result = filter_by_letter(&result, letter);
    }
    if query.year_from.is_some() || query.year_to.is_some() {
        let start = query.year_from.unwrap_or(i32::MIN);
        let end = query.year_to.unwrap_or(i32::MAX);
        result = filter_by_year_range(&result, start, end);
    }
    if let Some(min) = query.min_rating {
        result.retain(|b| b.rating.is_some_and(|r| r >= min));
    }
    if query.sort_by_title {
        sort_by_title(&mut result);
    }

    result
}

/// One page of items (1-based), plus the total page count.
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> (&[T], usize) {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * per_page).min(items.len());
    let end = (start + per_page).min(items.len());
    (&items[start..end], total_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Vec<Book> {
        let mut a = Book::new("1", "The Hobbit");
        a.author = Some("J.R.R. Tolkien".to_string());
        a.publish_date = Some("August 15th 2002".to_string());
        a.rating = Some(4.28);

        let mut b = Book::new("2", "Cien años de soledad");
        b.author = Some("Gabriel García Márquez".to_string());
        b.publish_date = Some("1967".to_string());
        b.rating = Some(4.07);

        let mut c = Book::new("3", "a Game of Thrones");
        c.author = Some("George R.R. Martin".to_string());
        c.rating = Some(4.44);

        vec![a, b, c]
    }

    fn titles(books: &[&Book]) -> Vec<String> {
        books.iter().map(|b| b.title.clone()).collect()
    }

    #[test]
    fn test_title_search_ignores_case_and_accents() {
        let books = library();
        let all: Vec<&Book> = books.iter().collect();
        assert_eq!(titles(&search_by_title(&all, "ANOS")), vec!["Cien años de soledad"]);
        assert_eq!(titles(&search_by_title(&all, "hob")), vec!["The Hobbit"]);
    }

    #[test]
    fn test_author_filter() {
        let books = library();
        let all: Vec<&Book> = books.iter().collect();
        assert_eq!(titles(&filter_by_author(&all, "garcia")), vec!["Cien años de soledad"]);
        assert!(filter_by_author(&all, "austen").is_empty());
    }

    #[test]
    fn test_sort_and_letter() {
        let books = library();
        let mut all: Vec<&Book> = books.iter().collect();
        sort_by_title(&mut all);
        assert_eq!(
            titles(&all),
            vec!["a Game of Thrones", "Cien años de soledad", "The Hobbit"]
        );
        assert_eq!(titles(&filter_by_letter(&all, 'T')), vec!["The Hobbit"]);
    }

    #[test]
    fn test_apply_combined_query() {
        let books = library();
        let query = BrowseQuery {
            year_from: Some(1900),
            year_to: Some(2000),
            ..Default::default()
        };
        assert_eq!(titles(&apply(&books, &query)), vec!["Cien años de soledad"]);

        let query = BrowseQuery {
            min_rating: Some(4.2),
            sort_by_title: true,
            ..Default::default()
        };
        assert_eq!(titles(&apply(&books, &query)), vec!["a Game of Thrones", "The Hobbit"]);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=7).collect();
        assert_eq!(paginate(&items, 1, 3), (&items[0..3], 3));
        assert_eq!(paginate(&items, 3, 3), (&items[6..7], 3));
        assert_eq!(paginate(&items, 99, 3), (&items[6..7], 3));

        let empty: Vec<u32> = Vec::new();
        let (page, total) = paginate(&empty, 1, 10);
        assert!(page.is_empty());
        assert_eq!(total, 1);
    }
}
