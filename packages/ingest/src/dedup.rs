//! Game fingerprints and the shared deduplication index.

use std::sync::{Mutex, PoisonError};

use masters_game_models::{DeduplicationIndex, GameResult, HeaderMap};
use sha2::{Digest as _, Sha256};

/// Derives a content key from a game's headers.
///
/// Two headers that describe the same game must produce the same key, no
/// matter which source they came from.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, headers: &HeaderMap) -> String;
}

impl<F> Fingerprinter for F
where
    F: Fn(&HeaderMap) -> String + Send + Sync,
{
    fn fingerprint(&self, headers: &HeaderMap) -> String {
        self(headers)
    }
}

/// SHA-256 over normalized `White`, `Black`, `Date`, and `Result`.
///
/// Names are trimmed, lowercased, and have internal whitespace collapsed,
/// so `"Carlsen,  Magnus"` and `"carlsen, magnus "` collide. The result is
/// reduced to its canonical token, so a missing tag and `*` are the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFingerprint;

impl Fingerprinter for HeaderFingerprint {
    fn fingerprint(&self, headers: &HeaderMap) -> String {
        let field = |key: &str| headers.get(key).map_or("", String::as_str);

        let key = [
            normalize_name(field("White")),
            normalize_name(field("Black")),
            field("Date").trim().to_string(),
            GameResult::from_tag(field("Result")).to_string(),
        ]
        .join("|");

        hex::encode(Sha256::digest(key.as_bytes()))
    }
}

/// Trims, lowercases, and collapses runs of whitespace to one space.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A [`DeduplicationIndex`] behind a mutex, for classification running on
/// more than one task.
///
/// Each check-and-insert is atomic, so of two concurrent inserts of the
/// same fingerprint exactly one reports a first occurrence.
#[derive(Debug, Default)]
pub struct SharedDeduplicationIndex {
    inner: Mutex<DeduplicationIndex>,
}

impl SharedDeduplicationIndex {
    #[must_use]
    pub const fn new(index: DeduplicationIndex) -> Self {
        Self {
            inner: Mutex::new(index),
        }
    }

    /// See [`DeduplicationIndex::check_and_insert`].
    pub fn check_and_insert(&self, fingerprint: &str, index: u64) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_and_insert(fingerprint, index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the underlying index.
    #[must_use]
    pub fn into_inner(self) -> DeduplicationIndex {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn headers(white: &str, black: &str, date: &str, result: &str) -> HeaderMap {
        [
            ("White", white),
            ("Black", black),
            ("Date", date),
            ("Result", result),
            ("Event", "ignored"),
        ]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
    }

    #[test]
    fn ignores_case_and_whitespace_in_names() {
        let a = headers("Carlsen,  Magnus", "Anand, V.", "2014.11.09", "1-0");
        let b = headers(" carlsen, magnus", "ANAND,   v. ", "2014.11.09", "1-0");
        assert_eq!(HeaderFingerprint.fingerprint(&a), HeaderFingerprint.fingerprint(&b));
    }

    #[test]
    fn other_tags_do_not_matter() {
        let a = headers("A", "B", "2000.01.01", "1/2-1/2");
        let mut b = a.clone();
        b.insert("Event".to_string(), "Different".to_string());
        b.insert("Round".to_string(), "7".to_string());
        assert_eq!(HeaderFingerprint.fingerprint(&a), HeaderFingerprint.fingerprint(&b));
    }

    #[test]
    fn distinguishes_games() {
        let a = headers("A", "B", "2000.01.01", "1-0");
        let b = headers("A", "B", "2000.01.01", "0-1");
        let c = headers("B", "A", "2000.01.01", "1-0");
        let fa = HeaderFingerprint.fingerprint(&a);
        assert_ne!(fa, HeaderFingerprint.fingerprint(&b));
        assert_ne!(fa, HeaderFingerprint.fingerprint(&c));
        assert_eq!(fa.len(), 64);
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("  Kasparov,\tGarry  "), "kasparov, garry");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn concurrent_inserts_admit_one() {
        let shared = Arc::new(SharedDeduplicationIndex::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.check_and_insert("same", i))
            })
            .collect();

        let firsts = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&first| first)
            .count();
        assert_eq!(firsts, 1);
        assert_eq!(shared.len(), 1);
    }
}
