use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::utils::slugify;

pub const DATE_KEY: &str = "submission date";

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap());

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(mon|tue|tues|wed|wednes|thu|thur|thurs|fri|sat|satur|sun)(day)?\.?,?\s+").unwrap()
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];
// Ambiguous slashed dates are read month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
];

#[derive(Debug, Default, PartialEq)]
pub struct ShardStats {
    pub records: usize,
    pub shards: usize,
    pub skipped: usize,
}

/// Rebuild `output_dir` from scratch out of every cached record in `raw_dir`.
pub fn build_shards(raw_dir: &Path, output_dir: &Path) -> Result<ShardStats> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir)
            .with_context(|| format!("Failed to clear {}", output_dir.display()))?;
    }

    let mut stats = ShardStats::default();
    let mut shards = BTreeSet::new();

    for path in cached_records(raw_dir)? {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let deck = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(deck)) => deck,
            Ok(_) => {
                warn!("Skipping {}: not a JSON object", path.display());
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                stats.skipped += 1;
                continue;
            }
        };

        let (date, deck) = normalize(deck);
        let shard = shard_path(output_dir, &date);
        append_line(&shard, &Value::Object(deck))?;

        stats.records += 1;
        shards.insert(shard);
    }

    stats.shards = shards.len();
    info!(
        "Wrote {} records into {} shards ({} skipped)",
        stats.records, stats.shards, stats.skipped
    );
    Ok(stats)
}

/// `*.json` files in `raw_dir`, sorted by file name.
fn cached_records(raw_dir: &Path) -> Result<Vec<PathBuf>> {
    if !raw_dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(raw_dir)
        .with_context(|| format!("Failed to list {}", raw_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Parse the submission date into an ISO timestamp and slugify every key.
fn normalize(deck: Map<String, Value>) -> (NaiveDateTime, Map<String, Value>) {
    let date = match deck.get(DATE_KEY) {
        None => earliest(),
        Some(raw) => {
            let text = raw.as_str().unwrap_or_default();
            parse_date(text).unwrap_or_else(|| {
                warn!("Unparseable submission date '{}', using the earliest date", text);
                earliest()
            })
        }
    };

    let mut out = Map::new();
    for (key, value) in deck {
        let value = if key == DATE_KEY {
            Value::String(iso(&date))
        } else {
            value
        };
        out.insert(slugify(&key, "_"), value);
    }
    if !out.contains_key(&slugify(DATE_KEY, "_")) {
        out.insert(slugify(DATE_KEY, "_"), Value::String(iso(&date)));
    }
    (date, out)
}

/// Date used for records that carry no submission date.
pub fn earliest() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

pub fn iso(date: &NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Best-effort parse of the free-text dates deck pages carry.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let no_weekday = WEEKDAY_RE.replace(text.trim(), "");
    let cleaned = ORDINAL_RE.replace_all(&no_weekday, "$1");
    let s = cleaned.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn shard_path(output_dir: &Path, date: &NaiveDateTime) -> PathBuf {
    output_dir
        .join(format!("{:04}", date.year()))
        .join(format!("{:02}.jsonl", date.month()))
}

fn append_line(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}", serde_json::to_string(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_raw(dir: &Path, name: &str, value: &Value) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn parses_common_date_shapes() {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_date("2021-07-15"), Some(ymd(2021, 7, 15)));
        assert_eq!(parse_date(" March 3, 2019 "), Some(ymd(2019, 3, 3)));
        assert_eq!(parse_date("Mar 3, 2019"), Some(ymd(2019, 3, 3)));
        assert_eq!(parse_date("3rd March 2019"), Some(ymd(2019, 3, 3)));
        assert_eq!(parse_date("July 21st, 2020"), Some(ymd(2020, 7, 21)));
        assert_eq!(parse_date("12/25/2018"), Some(ymd(2018, 12, 25)));
        assert_eq!(
            parse_date("2021-07-15 13:45:10"),
            NaiveDate::from_ymd_opt(2021, 7, 15).unwrap().and_hms_opt(13, 45, 10)
        );
        assert_eq!(
            parse_date("2020-01-02T03:04:05+02:00"),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(3, 4, 5)
        );
        assert_eq!(
            parse_date("July 15, 2021 10:30 am"),
            NaiveDate::from_ymd_opt(2021, 7, 15).unwrap().and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            parse_date("Jul 15, 2021 10:30 PM"),
            NaiveDate::from_ymd_opt(2021, 7, 15).unwrap().and_hms_opt(22, 30, 0)
        );
        assert_eq!(parse_date("15/07/2021"), Some(ymd(2021, 7, 15)));
        assert_eq!(parse_date("03/04/2021"), Some(ymd(2021, 3, 4)));
        assert_eq!(parse_date("15.07.2021"), Some(ymd(2021, 7, 15)));
        assert_eq!(parse_date("Thursday, July 15, 2021"), Some(ymd(2021, 7, 15)));
        assert_eq!(parse_date("Thu, 15th July 2021"), Some(ymd(2021, 7, 15)));
        assert_eq!(parse_date("sometime last week"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn earliest_date_renders_as_year_one() {
        assert_eq!(iso(&earliest()), "0001-01-01T00:00:00");
        assert_eq!(shard_path(Path::new("data"), &earliest()), Path::new("data/0001/01.jsonl"));
    }

    #[test]
    fn partitions_by_month_and_slugifies_keys() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("tmp");
        let out = dir.path().join("data");

        write_raw(
            &raw,
            "b-deck.json",
            &json!({"name": "B", "submission date": "2021-07-15", "Deck Master": "46986414", "deck": {"main": ["1"]}}),
        );
        write_raw(&raw, "a-deck.json", &json!({"name": "A", "submission date": "July 2nd, 2021"}));
        write_raw(&raw, "c-deck.json", &json!({"name": "C", "deck type": "Meta"}));
        write_raw(&raw, "d-deck.json", &json!({"name": "D", "submission date": "whenever"}));
        fs::write(raw.join("notes.txt"), "ignored").unwrap();

        let stats = build_shards(&raw, &out).unwrap();
        assert_eq!(stats, ShardStats { records: 4, shards: 2, skipped: 0 });

        let july = read_lines(&out.join("2021/07.jsonl"));
        assert_eq!(july.len(), 2);
        // sorted file name order: a-deck before b-deck
        assert_eq!(july[0]["name"], "A");
        assert_eq!(july[1]["name"], "B");
        assert_eq!(july[1]["submission_date"], "2021-07-15T00:00:00");
        assert_eq!(july[1]["deck_master"], "46986414");
        assert_eq!(july[1]["deck"], json!({"main": ["1"]}));
        assert!(july[1].get("submission date").is_none());

        let undated = read_lines(&out.join("0001/01.jsonl"));
        assert_eq!(undated.len(), 2);
        assert_eq!(undated[0]["name"], "C");
        assert_eq!(undated[0]["deck_type"], "Meta");
        assert_eq!(undated[0]["submission_date"], "0001-01-01T00:00:00");
        assert_eq!(undated[1]["name"], "D");
    }

    #[test]
    fn rebuild_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("tmp");
        let out = dir.path().join("data");
        write_raw(&raw, "x.json", &json!({"name": "X", "submission date": "2020-02-01"}));
        fs::create_dir_all(out.join("1999")).unwrap();
        fs::write(out.join("1999/12.jsonl"), "stale\n").unwrap();

        build_shards(&raw, &out).unwrap();
        build_shards(&raw, &out).unwrap();

        assert!(!out.join("1999").exists());
        assert_eq!(read_lines(&out.join("2020/02.jsonl")).len(), 1);
    }

    #[test]
    fn broken_cache_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("tmp");
        fs::create_dir_all(&raw).unwrap();
        fs::write(raw.join("broken.json"), "{not json").unwrap();
        write_raw(&raw, "list.json", &json!(["not", "an", "object"]));

        let stats = build_shards(&raw, &dir.path().join("data")).unwrap();
        assert_eq!(stats, ShardStats { records: 0, shards: 0, skipped: 2 });
    }
}
