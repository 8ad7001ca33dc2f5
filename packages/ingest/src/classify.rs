//! Master-game acceptance rules.
//!
//! The orchestrator only sees the [`Classifier`] trait. Any
//! `Fn(&HeaderMap) -> bool` is a classifier, so tests and callers can pass
//! closures; [`RatingClassifier`] is the configurable default.

use masters_game_models::{GameResult, HeaderMap};
use serde::Deserialize;

/// Decides whether a parsed game belongs in the corpus.
///
/// Must be pure: the same header map always gets the same answer.
pub trait Classifier: Send + Sync {
    fn accept(&self, headers: &HeaderMap) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&HeaderMap) -> bool + Send + Sync,
{
    fn accept(&self, headers: &HeaderMap) -> bool {
        self(headers)
    }
}

/// Accepts games by player presence, decisive tags, and rating floor.
///
/// Loaded from the `[classifier]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RatingClassifier {
    /// Both `WhiteElo` and `BlackElo` must parse and reach this value.
    /// `None` disables the rating check.
    pub min_rating: Option<u32>,
    /// Reject games whose `White` or `Black` tag is missing, empty, or `?`.
    pub require_players: bool,
    /// Reject games without a finished result (`1-0`, `0-1`, `1/2-1/2`).
    pub require_result: bool,
}

impl Default for RatingClassifier {
    fn default() -> Self {
        Self {
            min_rating: None,
            require_players: true,
            require_result: false,
        }
    }
}

impl Classifier for RatingClassifier {
    fn accept(&self, headers: &HeaderMap) -> bool {
        if self.require_players && !(has_player(headers, "White") && has_player(headers, "Black"))
        {
            return false;
        }

        if self.require_result {
            let result = headers.get("Result").map_or("", String::as_str);
            if GameResult::from_tag(result) == GameResult::Unknown {
                return false;
            }
        }

        if let Some(floor) = self.min_rating {
            let white = parse_rating(headers.get("WhiteElo").map(String::as_str));
            let black = parse_rating(headers.get("BlackElo").map(String::as_str));
            return matches!((white, black), (Some(w), Some(b)) if w >= floor && b >= floor);
        }

        true
    }
}

fn has_player(headers: &HeaderMap, key: &str) -> bool {
    headers
        .get(key)
        .map(|v| v.trim())
        .is_some_and(|v| !v.is_empty() && v != "?")
}

/// Parses an Elo tag value. Empty, `?`, `-`, and non-numeric values are
/// `None`.
#[must_use]
pub fn parse_rating(raw: Option<&str>) -> Option<u32> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&r| r > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn closures_are_classifiers() {
        let only_linares = |h: &HeaderMap| h.get("Event").is_some_and(|e| e == "Linares");
        assert!(only_linares.accept(&headers(&[("Event", "Linares")])));
        assert!(!only_linares.accept(&headers(&[("Event", "Wijk aan Zee")])));
    }

    #[test]
    fn default_requires_both_players() {
        let classifier = RatingClassifier::default();
        assert!(classifier.accept(&headers(&[("White", "Carlsen"), ("Black", "Caruana")])));
        assert!(!classifier.accept(&headers(&[("White", "Carlsen"), ("Black", "?")])));
        assert!(!classifier.accept(&headers(&[("White", "Carlsen")])));
        assert!(!classifier.accept(&headers(&[("White", "  "), ("Black", "Caruana")])));
    }

    #[test]
    fn rating_floor_needs_both_ratings() {
        let classifier = RatingClassifier {
            min_rating: Some(2500),
            ..RatingClassifier::default()
        };
        let base = [("White", "A"), ("Black", "B")];

        let mut strong = base.to_vec();
        strong.extend([("WhiteElo", "2700"), ("BlackElo", "2500")]);
        assert!(classifier.accept(&headers(&strong)));

        let mut weak = base.to_vec();
        weak.extend([("WhiteElo", "2700"), ("BlackElo", "2499")]);
        assert!(!classifier.accept(&headers(&weak)));

        let mut unrated = base.to_vec();
        unrated.extend([("WhiteElo", "2700"), ("BlackElo", "?")]);
        assert!(!classifier.accept(&headers(&unrated)));
    }

    #[test]
    fn result_requirement() {
        let classifier = RatingClassifier {
            require_result: true,
            ..RatingClassifier::default()
        };
        let finished = headers(&[("White", "A"), ("Black", "B"), ("Result", "1/2-1/2")]);
        let ongoing = headers(&[("White", "A"), ("Black", "B"), ("Result", "*")]);
        assert!(classifier.accept(&finished));
        assert!(!classifier.accept(&ongoing));
    }

    #[test]
    fn parses_ratings() {
        assert_eq!(parse_rating(Some(" 2851 ")), Some(2851));
        assert_eq!(parse_rating(Some("-")), None);
        assert_eq!(parse_rating(Some("0")), None);
        assert_eq!(parse_rating(None), None);
    }
}
