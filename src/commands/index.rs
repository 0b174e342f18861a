//! Index command - fill the embedding cache

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

use bookscape::search::EmbeddingCache;
use bookscape::{SemanticSearch, Settings};

use super::{load_dataset, report_ml_unavailable};

/// Run index command
pub fn run(settings: Settings, status_only: bool, rebuild: bool, json: bool) -> Result<()> {
    if !settings.ml_enabled {
        report_ml_unavailable(&bookscape::Error::MlDisabled, json);
        return Ok(());
    }

    let cache_path = settings.cache_path();
    if status_only {
        return show_status(&cache_path, &settings.model_id(), json);
    }

    let dataset = load_dataset(&settings)?;
    let mut engine = SemanticSearch::open(settings, dataset)?;

    if rebuild {
        let removed = engine.rebuild_cache()?;
        if !json {
            println!("{} Removed {} cached vectors", "→".dimmed(), removed);
        }
    }

    if !json {
        println!(
            "{} Embedding {} books with {}...",
            "→".dimmed(),
            engine.dataset().len(),
            engine.cache().model_id().cyan()
        );
    }

    let report = match engine.ensure_all() {
        Ok(report) => report,
        Err(e) if e.is_recoverable() => {
            report_ml_unavailable(&e, json);
            bail!("indexing stopped: embedding provider unavailable");
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "model_id": engine.cache().model_id(),
                "embedded": report.embedded,
                "cached": report.cached,
                "skipped": report.skipped,
                "failed": report.failed,
                "duration_ms": report.duration_ms,
            })
        );
    } else {
        println!();
        println!(
            "{} Embedded {} books in {:.2}s",
            "✓".green().bold(),
            report.embedded.to_string().cyan(),
            report.duration_ms as f64 / 1000.0
        );
        if report.cached > 0 {
            println!("  {} {} books already cached", "→".dimmed(), report.cached);
        }
        if report.skipped > 0 {
            println!(
                "  {} {} books skipped (no text)",
                "→".dimmed(),
                report.skipped
            );
        }
        if report.failed > 0 {
            println!(
                "  {} {} books failed, rerun to retry",
                "✗".red(),
                report.failed
            );
        }
        println!("  {} Cache saved to: {}", "→".dimmed(), cache_path.display());
    }

    if report.embedded == 0 && report.failed > 0 {
        bail!("none of the {} pending books could be embedded", report.failed);
    }

    Ok(())
}

/// Show cache status
fn show_status(cache_path: &Path, model_id: &str, json: bool) -> Result<()> {
    if !cache_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "cache_path": cache_path.display().to_string(),
                })
            );
        } else {
            println!("{} No embedding cache found", "✗".red());
            println!("  Run {} to build it", "bookscape index".cyan());
        }
        return Ok(());
    }

    let cache = EmbeddingCache::open(cache_path, model_id)?;
    let stats = cache.stats()?;
    let last_fill = cache.last_fill()?.and_then(format_timestamp);
    let last_insert = stats.last_insert.and_then(format_timestamp);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "cache_path": cache_path.display().to_string(),
                "model_id": stats.model_id,
                "entries": stats.entries,
                "models": stats.models,
                "last_fill": last_fill,
                "last_insert": last_insert,
            })
        );
    } else {
        println!("{}", "Embedding Cache Status".bold());
        println!("  Path:    {}", cache_path.display());
        println!("  Model:   {}", stats.model_id.cyan());
        println!("  Entries: {}", stats.entries.to_string().cyan());
        if let Some(last) = last_fill {
            println!("  Filled:  {}", last);
        }
        if let Some(last) = last_insert {
            println!("  Updated: {}", last);
        }
        if stats.models.len() > 1 {
            println!();
            println!("{}", "Other models".bold());
            for (model, count) in stats.models.iter().filter(|(m, _)| *m != stats.model_id) {
                println!("  {}  {}", model.dimmed(), count);
            }
        }
    }

    Ok(())
}

fn format_timestamp(ts: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
