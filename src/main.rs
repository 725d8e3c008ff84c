mod cache;
mod cards;
mod fetch;
mod listing;
mod parser;
mod record;
mod settings;
mod shards;
mod utils;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cards::CardIds;
use fetch::HttpFetcher;
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "deck_scraper",
    about = "Crawl deck lists, cache new decks and rebuild the monthly JSONL shards"
)]
struct Cli {
    /// File that receives warnings and errors (appended to)
    log_file: PathBuf,
}

fn init_tracing(log_file: &Path) -> Result<()> {
    if log_file.is_dir() {
        bail!("{} is a directory, expected a log file", log_file.display());
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let t0 = Instant::now();
    let settings = Settings::load()?;
    info!(settings = ?settings, "Starting deck scraper");

    let fetcher = HttpFetcher::new(&settings)?;

    // Phase 1: crawl the listing
    let found = listing::discover(&fetcher, &settings)?;
    println!("found {} new decks", found.new_urls.len());

    // Phase 2: fetch and cache every deck not cached yet
    let cards = CardIds::load(&settings.cards_file)?;
    if cards.is_empty() {
        warn!("Card table {} is empty, every card resolves to -1", settings.cards_file.display());
    }
    println!("{} card ids loaded", cards.len());
    let stats = cache::download_decks(&fetcher, &cards, &settings, found.all_urls())?;
    println!(
        "Decks: {} candidates ({} saved, {} already cached, {} empty, {} errors)",
        stats.total, stats.saved, stats.cached, stats.empty, stats.errors
    );

    // Phase 3: rebuild the monthly shards from the raw cache
    let built = shards::build_shards(&settings.raw_dir, &settings.output_dir)?;
    println!(
        "Wrote {} decks into {} shards under {}",
        built.records,
        built.shards,
        settings.output_dir.display()
    );

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
