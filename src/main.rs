mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bookscape::Settings;

#[derive(Parser)]
#[command(name = "bookscape")]
#[command(about = "Book dataset explorer with AI-powered recommendations", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Path to settings.json")]
    settings: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log progress to stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Browsing =====
    /// Filter, sort and page through the dataset
    Browse {
        #[arg(long, help = "Title contains (accent and case insensitive)")]
        title: Option<String>,
        #[arg(long, help = "Author contains")]
        author: Option<String>,
        #[arg(long, help = "Title starts with letter")]
        letter: Option<char>,
        #[arg(long, help = "Earliest publication year")]
        from: Option<i32>,
        #[arg(long, help = "Latest publication year")]
        to: Option<i32>,
        #[arg(long, help = "Minimum rating")]
        min_rating: Option<f32>,
        #[arg(long, help = "Sort by title")]
        sort: bool,
        #[arg(long, default_value_t = 1, help = "Page number")]
        page: usize,
        #[arg(long, default_value_t = 20, help = "Books per page")]
        per_page: usize,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Dataset statistics
    Stats {
        #[arg(long, default_value_t = 10, help = "Number of top authors and genres")]
        top: usize,
        #[arg(long, default_value_t = 1, help = "Minimum books per listed author")]
        min_books: usize,
        #[arg(long, help = "Rank authors by books published from this year")]
        from: Option<i32>,
        #[arg(long, help = "Rank authors by books published up to this year")]
        to: Option<i32>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Semantic Search =====
    /// Embed every book missing from the cache
    Index {
        #[arg(long, help = "Show cache status only")]
        status: bool,
        #[arg(long, help = "Drop cached vectors of the active model first")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Recommend books for a free-text query
    #[command(alias = "rec")]
    Recommend {
        query: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Books similar to a given book id
    Similar {
        book_id: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    /// Show effective settings
    Settings {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load_or_default(cli.settings.as_deref())?;

    match cli.command {
        Commands::Browse {
            title,
            author,
            letter,
            from,
            to,
            min_rating,
            sort,
            page,
            per_page,
            json,
        } => {
            let query = bookscape::BrowseQuery {
                title,
                author,
                letter,
                year_from: from,
                year_to: to,
                min_rating,
                sort_by_title: sort,
            };
            commands::browse::run(&settings, &query, page, per_page, json)
        }
        Commands::Stats {
            top,
            min_books,
            from,
            to,
            json,
        } => {
            let options = bookscape::core::stats::StatsOptions {
                top_n: top,
                min_books,
                year_from: from,
                year_to: to,
            };
            commands::stats::run(&settings, &options, json)
        }

        Commands::Index {
            status,
            rebuild,
            json,
        } => commands::index::run(settings, status, rebuild, json),
        Commands::Recommend { query, limit, json } => {
            commands::recommend::run(settings, &query, limit, json)
        }
        Commands::Similar {
            book_id,
            limit,
            json,
        } => commands::similar::run(settings, &book_id, limit, json),

        Commands::Settings { json } => commands::settings::run(&settings, json),
    }
}
