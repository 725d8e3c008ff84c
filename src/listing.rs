use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::fetch::Fetch;
use crate::settings::Settings;

static ENTRY_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.more-link").unwrap());

const PROGRESS_EVERY: usize = 20;

/// Result of one crawl: URLs newer than the frontier, and the previous backlog.
#[derive(Debug, Default)]
pub struct Discovery {
    pub new_urls: Vec<String>,
    pub old_urls: Vec<String>,
}

impl Discovery {
    /// Every candidate URL, newest first.
    pub fn all_urls(&self) -> impl Iterator<Item = &String> {
        self.new_urls.iter().chain(self.old_urls.iter())
    }
}

/// Walk the listing pages until the catalog ends or the last run's newest URL
/// shows up, then rewrite the backlog with the new URLs prepended.
pub fn discover(fetcher: &dyn Fetch, settings: &Settings) -> Result<Discovery> {
    let old_urls = load_backlog(&settings.backlog_file)?;
    let frontier = old_urls.first().map(String::as_str);
    info!("Backlog holds {} urls", old_urls.len());

    let mut new_urls = Vec::new();
    let mut page = 1;

    'pages: loop {
        if page % PROGRESS_EVERY == 0 {
            println!("{}", page);
        }

        let url = settings.listing_page(page);
        let body = match fetcher.get(&url) {
            Ok(p) if p.is_success() => p.body,
            Ok(p) => {
                info!("Reached the end of the list at page {} (status {})", page, p.status);
                break;
            }
            Err(e) => {
                warn!("Listing page {} failed, treating as end of list: {:#}", page, e);
                break;
            }
        };

        let links = entry_links(&body);
        if links.is_empty() {
            info!("Reached the end of the list at page {} (no entries)", page);
            break;
        }

        for link in links {
            if Some(link.as_str()) == frontier {
                info!("Reached the newest previously crawled url on page {}", page);
                break 'pages;
            }
            new_urls.push(link);
        }
        page += 1;
    }

    save_backlog(&settings.backlog_file, new_urls.iter().chain(old_urls.iter()))?;
    Ok(Discovery { new_urls, old_urls })
}

/// `href`s of the entry anchors on one listing page, in document order.
pub fn entry_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&ENTRY_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

pub fn load_backlog(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read backlog {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn save_backlog<'a>(path: &Path, urls: impl Iterator<Item = &'a String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = String::new();
    for url in urls {
        out.push_str(url);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("Failed to write backlog {}", path.display()))
}
