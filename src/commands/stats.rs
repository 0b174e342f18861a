//! Stats command - dataset summary

use anyhow::Result;
use colored::Colorize;

use bookscape::core::stats::{summarize, StatsOptions};
use bookscape::Settings;

use super::fit;
use super::load_dataset;

pub fn run(settings: &Settings, options: &StatsOptions, json: bool) -> Result<()> {
    let dataset = load_dataset(settings)?;
    let summary = summarize(dataset.books(), options);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Dataset".bold());
    println!("  Books:       {}", summary.total_books.to_string().cyan());
    println!("  Rated:       {}", summary.rated_books);
    if let Some(avg) = summary.avg_rating {
        println!("  Avg rating:  {:.2}", avg);
    }
    if let (Some((first, _)), Some((last, _))) = (
        summary.books_per_year.first_key_value(),
        summary.books_per_year.last_key_value(),
    ) {
        println!("  Years:       {}-{}", first, last);
    }
    if let Some((year, count)) = summary.busiest_year() {
        println!("  Busiest:     {} ({} books)", year, count);
    }

    if !summary.top_authors.is_empty() {
        println!();
        let window = match (summary.author_year_from, summary.author_year_to) {
            (Some(from), Some(to)) => format!(" ({}-{})", from, to),
            (Some(from), None) => format!(" (from {})", from),
            (None, Some(to)) => format!(" (up to {})", to),
            (None, None) => String::new(),
        };
        println!("{}{}", "Top authors".bold(), window.dimmed());
        for author in &summary.top_authors {
            let avg = author
                .avg_rating
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {}  {:>4} books  avg {}",
                fit(&author.author, 32),
                author.num_books,
                avg.dimmed()
            );
        }
    } else if summary.author_year_from.is_some() || summary.author_year_to.is_some() {
        println!();
        println!("No authors match the selected years");
    }

    if let Some((name, count)) = summary.top_publishers.first() {
        println!();
        println!("{}", "Top publishers".bold());
        println!(
            "  {} Most published: {} ({} books)",
            "→".dimmed(),
            name.cyan(),
            count
        );
        for (publisher, count) in &summary.top_publishers {
            println!("  {}  {:>5}", fit(publisher, 32), count);
        }
    }

    if !summary.top_genres.is_empty() {
        println!();
        println!("{}", "Top genres".bold());
        for (genre, count) in &summary.top_genres {
            println!("  {}  {:>5}", fit(genre, 32), count);
        }
    }

    Ok(())
}
