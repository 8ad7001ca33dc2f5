//! Tag-pair parsing for a single PGN record.

use std::ops::Range;
use std::sync::LazyLock;

use masters_game_models::{GameBoundary, HeaderMap};
use regex::Regex;

use crate::{RecordParseError, RecordParseReason};

static TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\[\s*([A-Za-z0-9_+#=:-]+)\s+"((?:[^"\\]|\\.)*)"\s*\]$"#)
        .expect("tag pair pattern is valid")
});

/// Parses the tag block at the start of `text[range]` into a
/// [`GameBoundary`] covering the whole range.
///
/// The tag block is the run of leading lines that start with `[`. When a
/// tag appears more than once the first value wins.
///
/// # Errors
///
/// Returns [`RecordParseError`] if the record has no tag pairs or a tag
/// line is malformed.
pub fn parse_record(text: &str, range: Range<usize>) -> Result<GameBoundary, RecordParseError> {
    let fail = |reason| RecordParseError {
        start_offset: range.start,
        end_offset: range.end,
        reason,
    };

    let mut header_map = HeaderMap::new();

    for line in text[range.clone()].lines() {
        let line = line.trim();
        if !line.starts_with('[') {
            break;
        }

        let Some(caps) = TAG_PAIR.captures(line) else {
            return Err(fail(RecordParseReason::MalformedTag {
                line: line.to_string(),
            }));
        };

        header_map
            .entry(caps[1].to_string())
            .or_insert_with(|| unescape(&caps[2]));
    }

    if header_map.is_empty() {
        return Err(fail(RecordParseReason::NoHeaders));
    }

    Ok(GameBoundary {
        header_map,
        start_offset: range.start,
        end_offset: range.end,
    })
}

/// Resolves PGN string escapes (`\"` and `\\`).
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.next()
        {
            out.push(next);
        } else {
            out.push(c);
        }
    }
    out
}
