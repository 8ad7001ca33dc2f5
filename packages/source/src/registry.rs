//! Source registry: the list of player archives to ingest.
//!
//! Sources are declared as a `[[sources]]` array in TOML:
//!
//! ```toml
//! [[sources]]
//! label = "Carlsen"
//! archive = "Carlsen.zip"
//! ```
//!
//! The list can be narrowed at runtime with a comma-separated label filter
//! so an operator can re-run only the sources that were skipped.

use std::collections::BTreeSet;

use masters_game_models::SourceDescriptor;
use serde::Deserialize;

/// Environment variable consulted when no CLI source filter is given.
pub const SOURCES_ENV: &str = "MASTERS_SOURCES";

/// Errors from loading or validating a source list.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The TOML document could not be parsed.
    #[error("invalid source list: {0}")]
    Toml(#[from] toml::de::Error),

    /// Two sources share a label.
    #[error("duplicate source label '{0}'")]
    DuplicateLabel(String),

    /// A source has an empty label or archive name.
    #[error("source #{position} is missing a label or archive name")]
    Incomplete {
        /// 1-based position in the list.
        position: usize,
    },
}

#[derive(Debug, Deserialize)]
struct SourceList {
    #[serde(default)]
    sources: Vec<SourceDescriptor>,
}

/// Parses a `[[sources]]` TOML document.
///
/// # Errors
///
/// Returns [`RegistryError`] if the TOML is malformed or the list fails
/// [`validate`].
pub fn parse_sources_toml(toml_str: &str) -> Result<Vec<SourceDescriptor>, RegistryError> {
    let list: SourceList = toml::from_str(toml_str)?;
    validate(&list.sources)?;
    Ok(list.sources)
}

/// Checks that every source has a label and archive name and that labels
/// are unique.
///
/// # Errors
///
/// Returns the first [`RegistryError`] found.
pub fn validate(sources: &[SourceDescriptor]) -> Result<(), RegistryError> {
    let mut seen = BTreeSet::new();
    for (i, source) in sources.iter().enumerate() {
        if source.label.trim().is_empty() || source.archive_name.trim().is_empty() {
            return Err(RegistryError::Incomplete { position: i + 1 });
        }
        if !seen.insert(source.label.as_str()) {
            return Err(RegistryError::DuplicateLabel(source.label.clone()));
        }
    }
    Ok(())
}

/// Returns the sources to ingest, filtered by `cli_filter` or the
/// [`SOURCES_ENV`] environment variable. Without either, all sources are
/// returned. Labels match case-insensitively.
#[must_use]
pub fn select_sources(
    all: Vec<SourceDescriptor>,
    cli_filter: Option<String>,
) -> Vec<SourceDescriptor> {
    let filter = cli_filter.or_else(|| std::env::var(SOURCES_ENV).ok());

    let Some(filter_str) = filter else {
        return all;
    };

    let labels: Vec<String> = filter_str
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    if labels.is_empty() {
        return all;
    }

    let available = all
        .iter()
        .map(|s| s.label.clone())
        .collect::<Vec<_>>()
        .join(", ");

    let filtered: Vec<SourceDescriptor> = all
        .into_iter()
        .filter(|s| labels.contains(&s.label.to_lowercase()))
        .collect();

    if filtered.is_empty() {
        log::warn!("No matching sources found for filter {labels:?}. Available: {available}");
    }

    filtered
}
