#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Retrieval and extraction of per-player game archives.
//!
//! A source is fetched through a [`fetch::Retriever`], unpacked with
//! [`archive::extract`], and handed to the parser as one PGN text blob.
//! Both steps report failures as values so the orchestrator can skip a
//! source without aborting the run.

pub mod archive;
pub mod fetch;
pub mod progress;
pub mod registry;
pub mod retry;

/// A download that did not produce a usable payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("download of {url} failed: {message}")]
pub struct TransportFailure {
    /// URL that was requested.
    pub url: String,
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    /// Description of what went wrong.
    pub message: String,
    /// Whether another attempt could plausibly succeed (timeouts,
    /// connection resets, HTTP 429 and 5xx).
    pub transient: bool,
}

/// An archive that could not be turned into PGN text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveFailure {
    /// The payload is not a readable archive.
    #[error("unreadable archive: {0}")]
    Unreadable(String),

    /// The archive opened but holds no record file.
    #[error("no entry ending in '{suffix}' (entries: {})", .entries.join(", "))]
    MissingEntry {
        /// Expected file-name suffix.
        suffix: String,
        /// Names of the entries that were present.
        entries: Vec<String>,
    },

    /// The record file could not be read out of the archive.
    #[error("failed to read '{entry}': {message}")]
    EntryRead {
        /// Entry name inside the archive.
        entry: String,
        /// Underlying cause.
        message: String,
    },
}
