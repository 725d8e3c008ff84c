use scraper::ElementRef;
use tracing::debug;

use crate::record::{Partitions, MAIN, SIDE};

/// Single pass over the direct children of `div.uploaded-deck-view`.
///
/// The current partition starts as `main`. An `<hr class="x-extra">` switches
/// it to the suffix after the first `-` of its first class (`side` when that is
/// missing). Every `<a data-name="…">` goes into the current partition.
pub fn partitions(view: ElementRef) -> Partitions {
    let mut decks = Partitions::new();
    let mut current = MAIN.to_string();

    for child in view.children().filter_map(ElementRef::wrap) {
        let el = child.value();
        match el.name() {
            "hr" => {
                let first_class = el.attr("class").and_then(|c| c.split_whitespace().next());
                current = partition_name(first_class);
            }
            "a" => match el.attr("data-name") {
                Some(name) => decks.entry(current.clone()).or_default().push(name.to_string()),
                None => debug!("Card link without data-name in {}", current),
            },
            _ => {}
        }
    }

    decks
}

fn partition_name(class: Option<&str>) -> String {
    class
        .and_then(|c| c.split_once('-'))
        .map(|(_, suffix)| suffix)
        .filter(|s| !s.is_empty())
        .unwrap_or(SIDE)
        .to_string()
}
