use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MAIN: &str = "main";
pub const SIDE: &str = "side";
pub const EXTRA: &str = "extra";

/// Card IDs per partition, in the order they were listed on the page.
pub type Partitions = BTreeMap<String, Vec<String>>;

/// One deck as scraped from its page. Metadata keys are flattened next to
/// `name` and `deck` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckRecord {
    pub name: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck: Option<Partitions>,
}

impl DeckRecord {
    /// Total number of card entries across all partitions.
    pub fn card_count(&self) -> usize {
        self.deck
            .as_ref()
            .map(|d| d.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

/// Lower-case hex SHA-256 of `value`. Unsalted, so it pseudonymizes rather
/// than protects.
pub fn hash_author(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
