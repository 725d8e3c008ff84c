use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "DECKS";

/// Where to crawl from and where everything lands on disk.
/// Every field can be overridden with `DECKS_<FIELD>` in the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Listing page template; `{}` is replaced by the 1-based page number.
    pub listing_url: String,
    pub backlog_file: PathBuf,
    pub cards_file: PathBuf,
    pub raw_dir: PathBuf,
    pub html_dir: PathBuf,
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listing_url: "https://ygoprodeck.com/category/decks/page/{}/".into(),
            backlog_file: "decks.txt".into(),
            cards_file: "../yugioh-cards/data/cards.csv".into(),
            raw_dir: "tmp".into(),
            html_dir: "html".into(),
            output_dir: "data".into(),
            user_agent: concat!("deck_scraper/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let d = Settings::default();
        Config::builder()
            .set_default("listing_url", d.listing_url)?
            .set_default("backlog_file", path_str(&d.backlog_file))?
            .set_default("cards_file", path_str(&d.cards_file))?
            .set_default("raw_dir", path_str(&d.raw_dir))?
            .set_default("html_dir", path_str(&d.html_dir))?
            .set_default("output_dir", path_str(&d.output_dir))?
            .set_default("user_agent", d.user_agent)?
            .set_default("timeout_secs", d.timeout_secs)?
            .add_source(env)
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Listing URL for one page of the catalog.
    pub fn listing_page(&self, page: usize) -> String {
        self.listing_url.replacen("{}", &page.to_string(), 1)
    }
}

fn path_str(p: &std::path::Path) -> String {
    p.to_string_lossy().into_owned()
}
