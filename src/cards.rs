use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// ID stored for any card name missing from the reference table.
pub const UNKNOWN_ID: &str = "-1";

#[derive(Debug, Deserialize)]
struct CardRow {
    name: String,
    id: String,
}

/// Card name → stable ID, loaded once per run and only read afterwards.
#[derive(Debug, Default, Clone)]
pub struct CardIds {
    by_name: HashMap<String, String>,
}

impl CardIds {
    /// Read the reference CSV (header columns `name` and `id`, others ignored).
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open card table {}", path.display()))?;

        let mut by_name = HashMap::new();
        for row in reader.deserialize::<CardRow>() {
            let row = row.with_context(|| format!("Bad row in card table {}", path.display()))?;
            by_name.insert(row.name, row.id);
        }

        info!("Loaded {} card ids from {}", by_name.len(), path.display());
        Ok(CardIds { by_name })
    }

    #[cfg(test)]
    pub fn from_pairs<I, N, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        CardIds {
            by_name: pairs
                .into_iter()
                .map(|(n, id)| (n.into(), id.into()))
                .collect(),
        }
    }

    /// Exact-match lookup. Misses are logged and mapped to [`UNKNOWN_ID`].
    pub fn resolve(&self, card_name: &str) -> String {
        match self.by_name.get(card_name) {
            Some(id) => id.clone(),
            None => {
                warn!("The card '{}' does not have an entry", card_name);
                UNKNOWN_ID.to_string()
            }
        }
    }

    pub fn resolve_all<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names.into_iter().map(|n| self.resolve(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_exact_names_only() {
        let cards = CardIds::from_pairs([("Dark Magician", "46986414"), ("Pot of Greed", "55144522")]);
        assert_eq!(cards.resolve("Dark Magician"), "46986414");
        assert_eq!(cards.resolve("Dark Magician"), "46986414");
        assert_eq!(cards.resolve("dark magician"), UNKNOWN_ID);
        assert_eq!(cards.resolve(" Pot of Greed"), UNKNOWN_ID);
        assert_eq!(cards.resolve(""), UNKNOWN_ID);
    }

    #[test]
    fn loads_csv_with_quoted_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id,name,type").unwrap();
        writeln!(f, "89631139,Blue-Eyes White Dragon,Normal Monster").unwrap();
        writeln!(f, "22916418,\"Hey, Trunade!\",Spell Card").unwrap();
        drop(f);

        let cards = CardIds::load(&path).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards.resolve("Blue-Eyes White Dragon"), "89631139");
        assert_eq!(cards.resolve("Hey, Trunade!"), "22916418");
    }

    #[test]
    fn missing_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CardIds::load(&dir.path().join("nope.csv")).is_err());
    }
}
