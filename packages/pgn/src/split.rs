//! Cuts concatenated PGN text into per-record byte ranges.
//!
//! This is a single linear scan over line starts; it does no tag or move
//! parsing. A record begins at the first non-blank line of the input and
//! at every tag line (`[...`) that follows either movetext or the blank
//! line closing a tag block. Lines inside a `{...}` comment that spans
//! several lines are movetext, even when they start with `[`.

use std::ops::Range;

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the first record.
    Idle,
    /// Inside a tag block.
    Tags,
    /// Blank line seen after a tag block, no movetext yet.
    AfterTags,
    /// Inside movetext.
    Moves,
}

/// Returns the byte range of every record in `text`, in document order.
///
/// Ranges are contiguous apart from trailing whitespace, which is trimmed
/// from the end of each range.
#[must_use]
pub fn record_ranges(text: &str) -> Vec<Range<usize>> {
    let mut starts = Vec::new();
    let mut state = ScanState::Idle;
    let mut in_comment = false;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        if in_comment {
            in_comment = comment_open_after(line, true);
            offset += line.len();
            continue;
        }

        let trimmed = line.trim();
        let is_tag = trimmed.starts_with('[');
        let is_blank = trimmed.is_empty();

        state = match state {
            ScanState::Idle if is_blank => ScanState::Idle,
            ScanState::Idle => {
                starts.push(offset);
                if is_tag { ScanState::Tags } else { ScanState::Moves }
            }
            ScanState::Tags if is_blank => ScanState::AfterTags,
            ScanState::Tags if is_tag => ScanState::Tags,
            ScanState::Tags => ScanState::Moves,
            ScanState::AfterTags | ScanState::Moves if is_tag => {
                starts.push(offset);
                ScanState::Tags
            }
            ScanState::AfterTags if is_blank => ScanState::AfterTags,
            ScanState::AfterTags | ScanState::Moves => ScanState::Moves,
        };

        if state == ScanState::Moves {
            in_comment = comment_open_after(line, false);
        }

        offset += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let next = starts.get(i + 1).copied().unwrap_or(text.len());
            let end = start + text[start..next].trim_end().len();
            start..end
        })
        .collect()
}

/// Whether a brace comment is still open at the end of `line`.
///
/// Brace comments do not nest. A `;` outside a brace comment comments out
/// the rest of the line.
fn comment_open_after(line: &str, mut open: bool) -> bool {
    for b in line.bytes() {
        match (open, b) {
            (true, b'}') => open = false,
            (false, b'{') => open = true,
            (false, b';') => break,
            _ => {}
        }
    }
    open
}
