#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PGN splitting and movetext extraction.
//!
//! A source's concatenated PGN text is cut into records by [`split`],
//! the tag pairs of each record are parsed by [`headers`] on a bounded
//! worker pool ([`stream::parse`]), and the mainline of a record is only
//! materialized on demand by [`moves::extract_moves`].

pub mod headers;
pub mod moves;
pub mod split;
pub mod stream;

pub use moves::{ExtractedMoves, extract_moves};
pub use stream::{ParseOptions, parse};

/// Why a single record could not be turned into a game boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordParseReason {
    /// The record has no tag pairs at all.
    #[error("record has no header block")]
    NoHeaders,

    /// A header line is not a well-formed `[Key "Value"]` pair.
    #[error("malformed tag pair: {line}")]
    MalformedTag {
        /// The offending line, trimmed.
        line: String,
    },

    /// The worker parsing this record's batch died.
    #[error("parser worker failed: {0}")]
    WorkerFailed(String),
}

/// A record that was skipped by the parser.
///
/// The record's byte range is kept so the failure can be reported with
/// its position in the source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record at bytes {start_offset}..{end_offset}: {reason}")]
pub struct RecordParseError {
    pub start_offset: usize,
    pub end_offset: usize,
    pub reason: RecordParseReason,
}
