//! Recommend command - semantic search over book descriptions

use anyhow::Result;
use colored::Colorize;

use bookscape::{Error, SemanticSearch, Settings};

use super::{load_dataset, print_scored, report_ml_unavailable, DEFAULT_LIMIT};

pub fn run(settings: Settings, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    if !settings.ml_enabled {
        report_ml_unavailable(&Error::MlDisabled, json);
        return Ok(());
    }

    let dataset = load_dataset(&settings)?;
    let mut engine = SemanticSearch::open(settings, dataset)?;

    if engine.cache().is_empty() {
        if json {
            println!("{}", serde_json::json!({ "results": [], "hint": "run bookscape index" }));
        } else {
            println!("{} Embedding cache is empty", "✗".red());
            println!("  Run {} first", "bookscape index".cyan());
        }
        return Ok(());
    }

    let results = match engine.search(query, limit) {
        Ok(results) => results,
        Err(e) if e.is_recoverable() => {
            report_ml_unavailable(&e, json);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if results.is_empty() && !json {
        println!("No results found for: {}", query.yellow());
        return Ok(());
    }

    if !json {
        println!(
            "{} Found {} results for: {}",
            "→".dimmed(),
            results.len().to_string().cyan(),
            query.yellow()
        );
        println!();
    }
    print_scored(&results, json)
}
