use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::settings::TextColumn;

lazy_static! {
    static ref DIGITS: Regex = Regex::new(r"\d+").unwrap();
    static ref YEAR: Regex = Regex::new(r"(\d{4})").unwrap();
    static ref PAREN_ROLE: Regex = Regex::new(r"\(.*?\)").unwrap();
    static ref NON_PRICE: Regex = Regex::new(r"[^\d.]").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r#"'([^']*)'|"([^"]*)""#).unwrap();
}

/// Column names of the dataset, in file order.
pub const COLUMNS: [&str; 25] = [
    "bookId",
    "title",
    "series",
    "author",
    "rating",
    "description",
    "language",
    "isbn",
    "genres",
    "characters",
    "bookFormat",
    "edition",
    "pages",
    "publisher",
    "publishDate",
    "firstPublishDate",
    "awards",
    "numRatings",
    "ratingsByStars",
    "likedPercent",
    "setting",
    "coverImg",
    "bbeScore",
    "bbeVotes",
    "price",
];

/// One CSV row as it appears on disk.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBook {
    pub book_id: String,
    pub title: String,
    pub series: String,
    pub author: String,
    pub rating: String,
    pub description: String,
    pub language: String,
    pub isbn: String,
    pub genres: String,
    pub characters: String,
    pub book_format: String,
    pub edition: String,
    pub pages: String,
    pub publisher: String,
    pub publish_date: String,
    pub first_publish_date: String,
    pub awards: String,
    pub num_ratings: String,
    pub ratings_by_stars: String,
    pub liked_percent: String,
    pub setting: String,
    pub cover_img: String,
    pub bbe_score: String,
    pub bbe_votes: String,
    pub price: String,
}

/// A book record with typed numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub series: Option<String>,
    /// Main author only
    pub author: Option<String>,
    pub rating: Option<f32>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub genres: Option<String>,
    pub characters: Option<String>,
    pub book_format: Option<String>,
    pub edition: Option<String>,
    pub pages: Option<u32>,
    pub publisher: Option<String>,
    pub publish_date: Option<String>,
    pub first_publish_date: Option<String>,
    pub awards: Option<String>,
    pub num_ratings: Option<u64>,
    pub ratings_by_stars: Option<String>,
    pub liked_percent: Option<f32>,
    pub setting: Option<String>,
    pub cover_img: Option<String>,
    pub bbe_score: Option<f64>,
    pub bbe_votes: Option<u64>,
    pub price: Option<f64>,
}

impl From<RawBook> for Book {
    fn from(raw: RawBook) -> Self {
        Self {
            book_id: raw.book_id.trim().to_string(),
            title: raw.title.trim().to_string(),
            series: non_empty(raw.series),
            author: clean_author(&raw.author),
            rating: parse_float(&raw.rating),
            description: non_empty(raw.description),
            language: non_empty(raw.language),
            isbn: non_empty(raw.isbn),
            genres: non_empty(raw.genres),
            characters: non_empty(raw.characters),
            book_format: non_empty(raw.book_format),
            edition: non_empty(raw.edition),
            pages: parse_int(&raw.pages),
            publisher: non_empty(raw.publisher),
            publish_date: non_empty(raw.publish_date),
            first_publish_date: non_empty(raw.first_publish_date),
            awards: non_empty(raw.awards),
            num_ratings: parse_int(&raw.num_ratings),
            ratings_by_stars: non_empty(raw.ratings_by_stars),
            liked_percent: parse_float(&raw.liked_percent),
            setting: non_empty(raw.setting),
            cover_img: non_empty(raw.cover_img),
            bbe_score: parse_float(&raw.bbe_score),
            bbe_votes: parse_int(&raw.bbe_votes),
            price: parse_price(&raw.price),
        }
    }
}

impl Book {
    /// Minimal record, mostly for tests and fixtures
    pub fn new(book_id: &str, title: &str) -> Self {
        Self {
            book_id: book_id.to_string(),
            title: title.to_string(),
            series: None,
            author: None,
            rating: None,
            description: None,
            language: None,
            isbn: None,
            genres: None,
            characters: None,
            book_format: None,
            edition: None,
            pages: None,
            publisher: None,
            publish_date: None,
            first_publish_date: None,
            awards: None,
            num_ratings: None,
            ratings_by_stars: None,
            liked_percent: None,
            setting: None,
            cover_img: None,
            bbe_score: None,
            bbe_votes: None,
            price: None,
        }
    }

    /// Publication year, if the date carries a plausible one
    pub fn year(&self) -> Option<i32> {
        let date = self.publish_date.as_deref()?;
        let year: i32 = YEAR.captures(date)?.get(1)?.as_str().parse().ok()?;
        (1000..=2100).contains(&year).then_some(year)
    }

    /// Genres parsed from the `['Fantasy', 'Fiction']` column format
    pub fn genre_list(&self) -> Vec<String> {
        let Some(raw) = self.genres.as_deref() else {
            return Vec::new();
        };
        LIST_ITEM
            .captures_iter(raw)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|g| !g.is_empty())
            .collect()
    }

    /// Text fed to the embedding provider; `None` when there is nothing to embed.
    pub fn embedding_text(&self, column: TextColumn) -> Option<String> {
        let description = self.description.as_deref().map(str::trim).unwrap_or("");
        let title = self.title.trim();
        let text = match column {
            TextColumn::Description => description.to_string(),
            TextColumn::Title => title.to_string(),
            TextColumn::TitleDescription if description.is_empty() => title.to_string(),
            TextColumn::TitleDescription => format!("{}. {}", title, description),
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn author_normalized(&self) -> String {
        self.author.as_deref().map(normalize_text).unwrap_or_default()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// First run of digits, so "336 pages" parses as 336
pub fn parse_int<T: std::str::FromStr>(value: &str) -> Option<T> {
    DIGITS.find(value)?.as_str().parse().ok()
}

pub fn parse_float<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

/// Strip currency symbols; "1.234.56" keeps only the last dot as decimal point
pub fn parse_price(value: &str) -> Option<f64> {
    let cleaned = NON_PRICE.replace_all(value, "");
    let parts: Vec<&str> = cleaned.split('.').collect();
    let cleaned = if parts.len() > 2 {
        let (last, rest) = parts.split_last()?;
        format!("{}.{}", rest.concat(), last)
    } else {
        cleaned.into_owned()
    };
    cleaned.parse().ok()
}

/// First listed author with "(Illustrator)"-style roles removed
pub fn clean_author(raw: &str) -> Option<String> {
    let first = raw.split(',').next()?;
    let main = PAREN_ROLE.replace_all(first, "");
    let main = main.trim();
    (!main.is_empty()).then(|| main.to_string())
}

/// Lower-case and fold common Latin diacritics for matching
pub fn normalize_text(text: &str) -> String {
    text.chars().map(fold_diacritic).collect::<String>().to_lowercase()
}

/// Sort key: folded, alphanumerics and whitespace only
pub fn normalize_title_for_sort(title: &str) -> String {
    normalize_text(title)
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' => 'c',
        'Ç' => 'C',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => c,
    }
}
