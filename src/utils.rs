//! Common helpers shared by the crawler, the cache writer and the shard builder.

use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use reqwest::Url;

static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lower-case `text` and join its alphanumeric runs with `separator`.
/// Accented letters are transliterated first, so "Pokémon" becomes "pokemon".
/// Apostrophes are dropped rather than split on, so "Dragon's" stays one word.
pub fn slugify(text: &str, separator: &str) -> String {
    let lower = deunicode::deunicode(text).to_lowercase().replace(['\'', '\u{2019}'], "");
    NON_ALNUM_RE
        .replace_all(&lower, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(separator)
}

/// Cache key for a deck URL: the slug of its path.
pub fn slug_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("invalid deck url {url}"))?;
    let slug = slugify(parsed.path(), "-");
    if slug.is_empty() {
        bail!("deck url {url} has no path to derive a cache key from");
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_keys() {
        assert_eq!(slugify("submission date", "_"), "submission_date");
        assert_eq!(slugify("Deck Master", "_"), "deck_master");
        assert_eq!(slugify("  --Tier: 1-- ", "-"), "tier-1");
        assert_eq!(slugify("Dragon's Fire", "-"), "dragons-fire");
        assert_eq!(slugify("", "-"), "");
        assert_eq!(slugify("Pokémon", "-"), "pokemon");
        assert_eq!(slugify("Pokémon", "_"), "pokemon");
    }

    #[test]
    fn test_slug_from_url() {
        assert_eq!(
            slug_from_url("https://ygoprodeck.com/deck/blue-eyes-chaos-max-12345/").unwrap(),
            "deck-blue-eyes-chaos-max-12345"
        );
        assert_eq!(
            slug_from_url("https://ygoprodeck.com/Sky_Striker/?ref=home").unwrap(),
            "sky-striker"
        );
        assert!(slug_from_url("https://ygoprodeck.com/").is_err());
        assert!(slug_from_url("not a url").is_err());
    }
}
