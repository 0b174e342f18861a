//! Similar command - books close to a given book in embedding space

use anyhow::{bail, Result};
use colored::Colorize;

use bookscape::{Error, SemanticSearch, Settings};

use super::{load_dataset, print_scored, report_ml_unavailable, DEFAULT_LIMIT};

pub fn run(settings: Settings, book_id: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    if !settings.ml_enabled {
        report_ml_unavailable(&Error::MlDisabled, json);
        return Ok(());
    }

    let dataset = load_dataset(&settings)?;
    let Some(title) = dataset.get(book_id).map(|b| b.title.clone()) else {
        bail!("unknown book id: {}", book_id);
    };

    let engine = SemanticSearch::open(settings, dataset)?;
    if !engine.cache().contains(book_id) {
        if json {
            println!(
                "{}",
                serde_json::json!({ "results": [], "hint": "book is not embedded yet, run bookscape index" })
            );
        } else {
            println!("{} {} has no cached embedding", "✗".red(), title.cyan());
            println!("  Run {} first", "bookscape index".cyan());
        }
        return Ok(());
    }

    let results = engine.similar_to(book_id, limit)?;

    if !json {
        println!("{} Books similar to {}", "→".dimmed(), title.cyan());
        println!();
    }
    print_scored(&results, json)
}
