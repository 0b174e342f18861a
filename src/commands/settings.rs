//! Settings command - show the effective configuration

use anyhow::Result;
use colored::Colorize;

use bookscape::{ProviderKind, Settings};

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    if json {
        let mut value = serde_json::to_value(settings)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("model_id".into(), settings.model_id().into());
            obj.insert(
                "resolved_books_path".into(),
                settings.books_path().display().to_string().into(),
            );
            obj.insert(
                "resolved_cache_path".into(),
                settings.cache_path().display().to_string().into(),
            );
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let enabled = if settings.ml_enabled {
        "yes".green()
    } else {
        "no".yellow()
    };

    println!("{}", "Settings".bold());
    println!("  ML enabled:   {}", enabled);
    println!("  Provider:     {}", settings.provider.to_string().cyan());
    println!("  Model id:     {}", settings.model_id());
    match settings.provider {
        ProviderKind::Local => {
            println!(
                "  Local model:  {} ({})",
                settings.local_model.as_str(),
                settings.local_model.backend_name().dimmed()
            );
        }
        ProviderKind::LmStudio => {
            println!("  Endpoint:     {}", settings.lmstudio_url);
        }
        ProviderKind::Gemini => {
            let key = if settings.read_api_key().is_some() {
                "found".green()
            } else {
                "missing".red()
            };
            println!("  Endpoint:     {}", settings.gemini_url);
            println!("  API key:      {}", key);
        }
    }
    println!("  Books:        {}", settings.books_path().display());
    println!("  Cache:        {}", settings.cache_path().display());
    println!("  Text column:  {:?}", settings.text_column);
    println!(
        "  Batching:     {} per batch, {}s delay, {} worker(s)",
        settings.batch_size, settings.batch_delay_seconds, settings.parallelism
    );

    Ok(())
}
