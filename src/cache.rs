use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info};

use crate::cards::CardIds;
use crate::fetch::Fetch;
use crate::parser;
use crate::settings::Settings;
use crate::utils::slug_from_url;

/// Counts returned after a download pass.
#[derive(Debug, Default, PartialEq)]
pub struct DownloadStats {
    pub total: usize,
    /// Already in the raw cache, not fetched.
    pub cached: usize,
    pub saved: usize,
    /// Pages without a usable content block.
    pub empty: usize,
    pub errors: usize,
}

enum Outcome {
    Cached,
    Saved,
    Empty,
}

/// Fetch and cache every URL that has no raw record yet. One failing URL is
/// logged and skipped; it stays uncached so the next run retries it.
pub fn download_decks<'a>(
    fetcher: &dyn Fetch,
    cards: &CardIds,
    settings: &Settings,
    urls: impl IntoIterator<Item = &'a String>,
) -> Result<DownloadStats> {
    fs::create_dir_all(&settings.raw_dir)
        .with_context(|| format!("Failed to create {}", settings.raw_dir.display()))?;
    fs::create_dir_all(&settings.html_dir)
        .with_context(|| format!("Failed to create {}", settings.html_dir.display()))?;

    let urls: Vec<&String> = urls.into_iter().collect();
    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut stats = DownloadStats {
        total: urls.len(),
        ..DownloadStats::default()
    };

    for url in urls {
        match cache_one(fetcher, cards, settings, url) {
            Ok(Outcome::Cached) => stats.cached += 1,
            Ok(Outcome::Saved) => stats.saved += 1,
            Ok(Outcome::Empty) => stats.empty += 1,
            Err(e) => {
                error!("Failed to process {}: {:#}", url, e);
                stats.errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Downloaded {} decks ({} saved, {} cached, {} empty, {} errors)",
        stats.total, stats.saved, stats.cached, stats.empty, stats.errors
    );
    Ok(stats)
}

fn cache_one(fetcher: &dyn Fetch, cards: &CardIds, settings: &Settings, url: &str) -> Result<Outcome> {
    let destination = record_path(&settings.raw_dir, url)?;
    if destination.exists() {
        return Ok(Outcome::Cached);
    }

    let Some(record) = parser::extract(fetcher, cards, &settings.html_dir, url)? else {
        return Ok(Outcome::Empty);
    };

    debug!("Caching '{}' with {} cards", record.name, record.card_count());
    let json = serde_json::to_string(&record)?;
    fs::write(&destination, json)
        .with_context(|| format!("Failed to write {}", destination.display()))?;
    Ok(Outcome::Saved)
}

pub fn record_path(raw_dir: &Path, url: &str) -> Result<PathBuf> {
    Ok(raw_dir.join(format!("{}.json", slug_from_url(url)?)))
}
