use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::debug;

use super::element_text;
use crate::record::{Partitions, EXTRA, MAIN, SIDE};

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static NAMED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[data-name]").unwrap());

const MAIN_CATEGORIES: &[&str] = &["Monster", "Spells", "Traps"];

/// Cards from the table-based layout. `tables` is every table in the content
/// block, metadata table first. `None` when there is no card table.
pub fn partitions(tables: &[ElementRef]) -> Option<Partitions> {
    let card_table = tables
        .iter()
        .skip(1)
        .find(|t| !t.value().classes().any(|c| c == "wikitable"))?;

    let categories: HashMap<String, Vec<String>> = card_table
        .select(&ROW)
        .skip(1)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&CELL).collect();
            if cells.len() < 2 {
                return None;
            }
            Some((element_text(cells[0]).trim().to_string(), cell_cards(cells[1])))
        })
        .collect();

    let take = |label: &str| categories.get(label).cloned().unwrap_or_default();

    let mut decks = Partitions::new();
    decks.insert(MAIN.to_string(), MAIN_CATEGORIES.iter().flat_map(|&c| take(c)).collect());
    decks.insert(SIDE.to_string(), take("Side"));
    decks.insert(EXTRA.to_string(), take("Extra"));
    Some(decks)
}

/// Walk a category cell made of `card, count` node pairs, e.g.
/// `<a data-name="Pot of Greed">…</a> x3`. A card is repeated as many times
/// as the last digit of the label that follows it. Cards without a count and
/// labels without a card are dropped.
fn cell_cards(cell: ElementRef) -> Vec<String> {
    let mut names = Vec::new();
    let mut pending: Option<&str> = None;

    for node in cell.children() {
        let label = match ElementRef::wrap(node) {
            Some(el) => match card_name(el) {
                Some(name) => {
                    if let Some(dropped) = pending.replace(name) {
                        debug!("No count label after '{}'", dropped);
                    }
                    continue;
                }
                None => element_text(el),
            },
            None => match node.value().as_text() {
                Some(text) => text.trim().to_string(),
                None => continue,
            },
        };

        match (trailing_count(&label), pending) {
            (Some(count), Some(name)) => {
                names.extend(std::iter::repeat(name.to_string()).take(count));
                pending = None;
            }
            (None, _) => {}
            (Some(_), None) => debug!("Count label '{}' has no card", label.trim()),
        }
    }

    if let Some(dropped) = pending {
        debug!("No count label after '{}'", dropped);
    }
    names
}

fn card_name<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    el.value()
        .attr("data-name")
        .or_else(|| el.select(&NAMED).next().and_then(|n| n.value().attr("data-name")))
}

/// "x3" → 3. Only the final character counts.
fn trailing_count(label: &str) -> Option<usize> {
    label
        .trim()
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as usize)
}
