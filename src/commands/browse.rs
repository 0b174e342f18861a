//! Browse command - filter, sort and page through the dataset

use anyhow::Result;
use colored::Colorize;

use bookscape::core::browse::{apply, paginate};
use bookscape::{BrowseQuery, Settings};

use super::{fit, load_dataset};

const TITLE_WIDTH: usize = 48;
const AUTHOR_WIDTH: usize = 28;

pub fn run(
    settings: &Settings,
    query: &BrowseQuery,
    page: usize,
    per_page: usize,
    json: bool,
) -> Result<()> {
    let dataset = load_dataset(settings)?;
    let matches = apply(dataset.books(), query);
    let (rows, total_pages) = paginate(&matches, page, per_page);
    let page = page.clamp(1, total_pages);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "total": matches.len(),
                "page": page,
                "total_pages": total_pages,
                "books": rows,
            }))?
        );
        return Ok(());
    }

    if matches.is_empty() {
        println!("No books match the current filters");
        return Ok(());
    }

    println!(
        "{}  {}  {}  {}",
        fit("Title", TITLE_WIDTH).bold(),
        fit("Author", AUTHOR_WIDTH).bold(),
        "Year".bold(),
        "Rating".bold()
    );
    for book in rows {
        let year = book
            .year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());
        let rating = book
            .rating
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {:>4}  {:>6}",
            fit(&book.title, TITLE_WIDTH).cyan(),
            fit(book.author.as_deref().unwrap_or("-"), AUTHOR_WIDTH).dimmed(),
            year,
            rating
        );
    }

    println!();
    println!(
        "{} Page {}/{} ({} books)",
        "→".dimmed(),
        page,
        total_pages,
        matches.len()
    );

    Ok(())
}
