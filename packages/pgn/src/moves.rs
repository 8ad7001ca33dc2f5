//! Lazy movetext extraction for accepted games.
//!
//! Only records that survive classification and deduplication reach this
//! step. The record is sliced out of the source text by its boundary
//! offsets, the tag block is skipped, and the remainder is tokenized with
//! `pgn-reader`. Comments, NAGs, and variations are dropped; the mainline
//! is re-emitted as `1. e4 e5 2. Nf3` without the result token.

use std::fmt::Write as _;
use std::ops::ControlFlow;

use masters_game_models::GameBoundary;
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};

/// Canonical mainline of one game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMoves {
    pub move_text: String,
    /// Number of half-moves in the mainline.
    pub ply_count: u32,
}

/// Extracts the mainline of the record at `boundary` within `text`.
///
/// Never fails: a record whose movetext cannot be tokenized yields an
/// empty move text and a ply count of 0.
#[must_use]
pub fn extract_moves(text: &str, boundary: &GameBoundary) -> ExtractedMoves {
    let Some(record) = text.get(boundary.start_offset..boundary.end_offset) else {
        log::warn!(
            "boundary {}..{} is outside the source text ({} bytes)",
            boundary.start_offset,
            boundary.end_offset,
            text.len()
        );
        return ExtractedMoves::default();
    };

    normalize_movetext(strip_tag_block(record))
}

/// Tokenizes a bare movetext section into its canonical mainline.
#[must_use]
pub fn normalize_movetext(movetext: &str) -> ExtractedMoves {
    let mut reader = Reader::new(movetext.as_bytes());
    let mut visitor = MainlineVisitor::default();

    match reader.read_game(&mut visitor) {
        Ok(Some(moves)) => moves,
        Ok(None) => ExtractedMoves::default(),
        Err(e) => {
            log::warn!("movetext could not be read: {e}");
            ExtractedMoves::default()
        }
    }
}

/// Returns the part of `record` after its leading tag lines.
fn strip_tag_block(record: &str) -> &str {
    let mut offset = 0;
    for line in record.split_inclusive('\n') {
        if !line.trim_start().starts_with('[') {
            break;
        }
        offset += line.len();
    }
    &record[offset..]
}

#[derive(Default)]
struct MainlineVisitor {
    ply_count: u32,
}

impl Visitor for MainlineVisitor {
    type Tags = ();
    type Movetext = String;
    type Output = ExtractedMoves;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.ply_count = 0;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        _: &[u8],
        _: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(String::with_capacity(256))
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if !movetext.is_empty() {
            movetext.push(' ');
        }

        if self.ply_count.is_multiple_of(2) {
            let _ = write!(movetext, "{}. ", (self.ply_count / 2) + 1);
        }

        let _ = write!(movetext, "{san}");
        self.ply_count += 1;
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        ExtractedMoves {
            move_text: movetext,
            ply_count: self.ply_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use masters_game_models::HeaderMap;

    use super::*;

    fn boundary_of(text: &str) -> GameBoundary {
        GameBoundary {
            header_map: HeaderMap::new(),
            start_offset: 0,
            end_offset: text.len(),
        }
    }

    #[test]
    fn counts_three_plies() {
        let moves = normalize_movetext("1. e4 e5 2. Nf3");
        assert_eq!(moves.ply_count, 3);
        assert_eq!(moves.move_text, "1. e4 e5 2. Nf3");
    }

    #[test]
    fn counts_two_plies() {
        assert_eq!(normalize_movetext("1. e4 e5").ply_count, 2);
    }

    #[test]
    fn strips_headers_and_result() {
        let text = "[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0";
        let moves = extract_moves(text, &boundary_of(text));
        assert_eq!(moves.move_text, "1. e4 e5 2. Nf3 Nc6");
        assert_eq!(moves.ply_count, 4);
    }

    #[test]
    fn drops_comments_nags_and_variations() {
        let moves = normalize_movetext(
            "1. e4 {best by test} e5 $1 2. Nf3 (2. f4 exf4) 2... Nc6 3. Bb5 a6 1/2-1/2",
        );
        assert_eq!(moves.move_text, "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6");
        assert_eq!(moves.ply_count, 6);
    }

    #[test]
    fn empty_movetext_has_zero_plies() {
        let text = "[Event \"Empty\"]\n\n*";
        let moves = extract_moves(text, &boundary_of(text));
        assert_eq!(moves, ExtractedMoves::default());
    }

    #[test]
    fn slices_by_offsets() {
        let text = "[Event \"A\"]\n\n1. d4 d5 *\n\n[Event \"B\"]\n\n1. c4 e5 2. Nc3 0-1\n";
        let start = text.rfind("[Event").unwrap();
        let boundary = GameBoundary {
            header_map: HeaderMap::new(),
            start_offset: start,
            end_offset: text.len(),
        };
        let moves = extract_moves(text, &boundary);
        assert_eq!(moves.move_text, "1. c4 e5 2. Nc3");
        assert_eq!(moves.ply_count, 3);
    }

    #[test]
    fn out_of_range_boundary_is_empty() {
        let boundary = GameBoundary {
            header_map: HeaderMap::new(),
            start_offset: 10,
            end_offset: 500,
        };
        assert_eq!(extract_moves("short", &boundary).ply_count, 0);
    }
}
