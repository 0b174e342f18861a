pub mod browse;
pub mod index;
pub mod recommend;
pub mod settings;
pub mod similar;
pub mod stats;

use anyhow::{Context, Result};
use colored::Colorize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use bookscape::search::ScoredBook;
use bookscape::{Dataset, Error, Settings};

pub const DEFAULT_LIMIT: usize = 5;

/// Load the dataset named in settings; failure is fatal
pub fn load_dataset(settings: &Settings) -> Result<Dataset> {
    let path = settings.books_path();
    Dataset::load(&path).with_context(|| format!("cannot load books from {}", path.display()))
}

/// Pad or cut `text` to exactly `width` terminal columns
pub fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return format!("{}{}", text, " ".repeat(width - text.width()));
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

/// Tell the user ML features are off or failing, without aborting
pub fn report_ml_unavailable(err: &Error, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "error": err.to_string(),
                "ml_available": false,
            })
        );
    } else {
        eprintln!("{} {}", "!".yellow().bold(), err);
        if !matches!(err, Error::MlDisabled) {
            eprintln!(
                "  {} ML features are unavailable; browsing still works",
                "→".dimmed()
            );
        }
    }
}

pub fn print_scored(results: &[ScoredBook], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let score_str = format!("{:.2}", result.score);
        let score_colored = if result.score > 0.8 {
            score_str.green()
        } else if result.score > 0.6 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        println!(
            "{}. [{}] {}",
            (i + 1).to_string().bold(),
            score_colored,
            result.title.cyan()
        );
        if let Some(ref author) = result.author {
            println!("   {}", author.dimmed());
        }
        println!("   {} {}", "id:".dimmed(), result.book_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit() {
        assert_eq!(fit("Dune", 6), "Dune  ");
        assert_eq!(fit("The Hobbit", 6), "The H…");
        assert_eq!(fit("", 2), "  ");
        // Wide characters take two columns
        assert_eq!(fit("三体问题", 5), "三体…");
    }
}
