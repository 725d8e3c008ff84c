pub mod legacy;
pub mod uploaded;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use scraper::{ElementRef, Html, Selector};

use crate::cards::CardIds;
use crate::fetch::Fetch;
use crate::record::{hash_author, DeckRecord, Partitions};
use crate::utils::slug_from_url;

static CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.article-content").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1.entry-title").unwrap());
static DECK_VIEW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.uploaded-deck-view").unwrap());

const MASTER_KEYS: &[&str] = &["deck master", "master"];

/// The two card-list markups a deck page can use.
enum Layout<'a> {
    /// `div.uploaded-deck-view`: cards and partition markers as siblings.
    Uploaded(ElementRef<'a>),
    /// Every table in the content block, metadata table first.
    Legacy(Vec<ElementRef<'a>>),
}

impl<'a> Layout<'a> {
    fn detect(content: ElementRef<'a>) -> Self {
        match content.select(&DECK_VIEW).next() {
            Some(view) => Layout::Uploaded(view),
            None => Layout::Legacy(content.select(&TABLE).collect()),
        }
    }

    /// Card names per partition, or `None` when the page lists no cards.
    fn partitions(&self) -> Option<Partitions> {
        match self {
            Layout::Uploaded(view) => Some(uploaded::partitions(*view)),
            Layout::Legacy(tables) => legacy::partitions(tables),
        }
    }
}

/// Fetch one deck page, keep its HTML in `html_dir` and parse it.
pub fn extract(
    fetcher: &dyn Fetch,
    cards: &CardIds,
    html_dir: &Path,
    url: &str,
) -> Result<Option<DeckRecord>> {
    let slug = slug_from_url(url)?;
    let page = fetcher.get(url)?;
    if !page.is_success() {
        bail!("deck page {} answered {}", url, page.status);
    }

    let html_path = html_dir.join(format!("{}.html", slug));
    fs::write(&html_path, &page.body)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;

    Ok(parse_deck_page(&page.body, cards))
}

/// Build a record from a deck page. `None` when the content block is
/// missing or has no table at all.
pub fn parse_deck_page(html: &str, cards: &CardIds) -> Option<DeckRecord> {
    let doc = Html::parse_document(html);
    let content = doc.select(&CONTENT).next()?;
    let info_table = content.select(&TABLE).next()?;

    let mut fields = parse_info_table(info_table);
    fields.remove("name");
    fields.remove("deck");

    if let Some(author) = fields.get_mut("author") {
        *author = hash_author(author);
    }
    for key in MASTER_KEYS {
        if let Some(master) = fields.get_mut(*key) {
            *master = cards.resolve(master);
        }
    }

    let name = content
        .select(&TITLE)
        .next()
        .map(|h| h.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let deck = Layout::detect(content).partitions().map(|names| {
        names
            .into_iter()
            .map(|(partition, names)| (partition, cards.resolve_all(&names)))
            .collect()
    });

    Some(DeckRecord { name, fields, deck })
}

/// Two-column key/value rows after the header row.
fn parse_info_table(table: ElementRef) -> BTreeMap<String, String> {
    table
        .select(&ROW)
        .skip(1)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&CELL).collect();
            if cells.len() < 2 {
                return None;
            }
            Some((field_key(&element_text(cells[0])), element_text(cells[1]).trim().to_string()))
        })
        .collect()
}

/// "Submission Date:\n" → "submission date".
fn field_key(raw: &str) -> String {
    raw.to_lowercase()
        .trim_matches(|c: char| c == '\n' || c == ':' || c == ' ')
        .to_string()
}

pub(crate) fn element_text(el: ElementRef) -> String {
    el.text().collect()
}
