#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data model for the master-game corpus.
//!
//! Every archive source produces [`GameRecord`]s that share one global
//! `index` space and one [`DeduplicationIndex`]. The whole run is persisted
//! as a single [`Corpus`] document.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// PGN tag pairs of a single game, keyed by tag name.
pub type HeaderMap = BTreeMap<String, String>;

/// One remote archive to ingest (typically one player's collected games).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Short operator-facing name (e.g., `"Carlsen"`).
    pub label: String,
    /// Archive file name appended to the configured base URL
    /// (e.g., `"Carlsen.zip"`).
    #[serde(alias = "archive", alias = "archive_name")]
    pub archive_name: String,
}

impl SourceDescriptor {
    /// Creates a descriptor from a label and archive name.
    #[must_use]
    pub fn new(label: impl Into<String>, archive_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            archive_name: archive_name.into(),
        }
    }

    /// Builds the download URL for this source under `base_url`.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        if base_url.ends_with('/') {
            format!("{base_url}{}", self.archive_name)
        } else {
            format!("{base_url}/{}", self.archive_name)
        }
    }
}

/// Outcome of a game, as given by the PGN `Result` tag.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameResult {
    /// `1-0`
    #[strum(serialize = "1-0")]
    WhiteWin,
    /// `0-1`
    #[strum(serialize = "0-1")]
    BlackWin,
    /// `1/2-1/2`
    #[strum(serialize = "1/2-1/2")]
    Draw,
    /// `*`, missing, or anything unrecognized.
    #[default]
    #[strum(serialize = "*")]
    Unknown,
}

impl GameResult {
    /// Maps a raw `Result` tag value to a [`GameResult`], falling back to
    /// [`GameResult::Unknown`] for anything that is not a decisive or drawn
    /// result token.
    #[must_use]
    pub fn from_tag(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }
}

/// A game accepted into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Run-wide sequence number, assigned in acceptance order.
    pub index: u64,
    pub white: String,
    pub black: String,
    pub white_rating: Option<u32>,
    pub black_rating: Option<u32>,
    pub result: GameResult,
    /// Raw PGN date (e.g., `"1999.01.20"` or `"1999.??.??"`).
    pub date: String,
    pub event: String,
    pub site: String,
    pub eco_code: Option<String>,
    pub opening_name: Option<String>,
    /// Canonical mainline movetext (`1. e4 e5 2. Nf3`).
    pub move_text: String,
    pub ply_count: u32,
    /// Label of the source the game was first seen in.
    pub source_tag: String,
    /// Archive file name of that source.
    pub source_file: String,
    pub fingerprint: String,
}

/// Location of one game inside a source text blob.
///
/// `start_offset..end_offset` is a byte range into the blob the boundary
/// was parsed from; the move extractor slices it lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameBoundary {
    pub header_map: HeaderMap,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl GameBoundary {
    /// Returns a header value, or `None` when the tag is absent.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header_map.get(key).map(String::as_str)
    }
}

/// Fingerprint → first-seen `index` mapping for one pipeline run.
///
/// Insert-only: entries are never replaced or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeduplicationIndex(BTreeMap<String, u64>);

impl DeduplicationIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Records `fingerprint` as first seen at `index`.
    ///
    /// Returns `true` if this is the first occurrence. A duplicate leaves
    /// the existing entry untouched and returns `false`.
    pub fn check_and_insert(&mut self, fingerprint: &str, index: u64) -> bool {
        match self.0.entry(fingerprint.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(index);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Returns the index under which `fingerprint` was first accepted.
    #[must_use]
    pub fn first_seen(&self, fingerprint: &str) -> Option<u64> {
        self.0.get(fingerprint).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-source (or aggregate) record counters.
///
/// The counters are only advanced through the `record_*` methods, which
/// keep `total == accepted + rejected + duplicates`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub duplicates: u64,
}

impl RunStatistics {
    pub const fn record_accepted(&mut self) {
        self.total += 1;
        self.accepted += 1;
    }

    pub const fn record_rejected(&mut self) {
        self.total += 1;
        self.rejected += 1;
    }

    pub const fn record_duplicate(&mut self) {
        self.total += 1;
        self.duplicates += 1;
    }

    /// Adds another set of counters into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.duplicates += other.duplicates;
    }

    /// Returns `true` when `total == accepted + rejected + duplicates`.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.total == self.accepted + self.rejected + self.duplicates
    }
}

/// Pipeline stage at which a source was abandoned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "snake_case")]
pub enum FailedStage {
    Downloading,
    Extracting,
}

/// How a single source ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceOutcome {
    /// Downloaded, extracted, and parsed to the end.
    Completed,
    /// Abandoned before parsing; contributed zero records.
    Skipped {
        /// Stage that failed.
        stage: FailedStage,
        /// Human-readable cause, for the operator.
        reason: String,
    },
}

impl SourceOutcome {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Result of processing one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: SourceDescriptor,
    pub outcome: SourceOutcome,
    pub stats: RunStatistics,
    pub elapsed: Duration,
}

/// The persisted artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<GameRecord>,
    pub index: DeduplicationIndex,
}

impl Corpus {
    /// Next free `index` value after the records already in this corpus.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.records.iter().map(|r| r.index + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_result_tags() {
        assert_eq!(GameResult::from_tag("1-0"), GameResult::WhiteWin);
        assert_eq!(GameResult::from_tag("0-1"), GameResult::BlackWin);
        assert_eq!(GameResult::from_tag(" 1/2-1/2 "), GameResult::Draw);
        assert_eq!(GameResult::from_tag("*"), GameResult::Unknown);
        assert_eq!(GameResult::from_tag("draw"), GameResult::Unknown);
        assert_eq!(GameResult::Draw.to_string(), "1/2-1/2");
    }

    #[test]
    fn dedup_index_first_occurrence_wins() {
        let mut index = DeduplicationIndex::new();
        assert!(index.check_and_insert("abc", 0));
        assert!(!index.check_and_insert("abc", 7));
        assert_eq!(index.first_seen("abc"), Some(0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn stats_stay_consistent() {
        let mut stats = RunStatistics::default();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_rejected();
        stats.record_duplicate();
        assert_eq!(stats.total, 4);
        assert!(stats.is_consistent());

        let mut aggregate = RunStatistics::default();
        aggregate.merge(&stats);
        aggregate.merge(&stats);
        assert_eq!(aggregate.total, 8);
        assert_eq!(aggregate.accepted, 4);
        assert!(aggregate.is_consistent());
    }

    #[test]
    fn builds_source_url() {
        let source = SourceDescriptor::new("Carlsen", "Carlsen.zip");
        assert_eq!(
            source.url("https://example.org/players/"),
            "https://example.org/players/Carlsen.zip"
        );
        assert_eq!(
            source.url("https://example.org/players"),
            "https://example.org/players/Carlsen.zip"
        );
    }

    #[test]
    fn corpus_next_index_follows_highest() {
        let corpus = Corpus {
            generated_at: Utc::now(),
            records: Vec::new(),
            index: DeduplicationIndex::new(),
        };
        assert_eq!(corpus.next_index(), 0);
    }

    #[test]
    fn dedup_index_serializes_as_plain_map() {
        let mut index = DeduplicationIndex::new();
        index.check_and_insert("ff00", 3);
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"ff00":3}"#);
    }
}
