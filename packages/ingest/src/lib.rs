#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting master-level chess games from per-player PGN
//! archives into a single deduplicated corpus.
//!
//! The moving parts are wired together in [`pipeline::Pipeline`]; this
//! module holds the top-level error type and the entry points shared by
//! the CLI subcommands and the interactive menu.

pub mod classify;
pub mod config;
pub mod dedup;
pub mod interactive;
pub mod persist;
pub mod pipeline;
pub mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use masters_cli_utils::{IndicatifProgress, MultiProgress};
use masters_game_models::{Corpus, SourceDescriptor};
use masters_source::fetch::{FileRetriever, HttpRetriever, Retriever, is_local};
use masters_source::progress::ProgressCallback;

use crate::config::{ConfigError, IngestConfig};
use crate::persist::PersistenceError;
use crate::pipeline::{Pipeline, PipelineOptions, RunOutcome};

/// Errors that end a run.
///
/// Per-source download and extraction failures are not here: they are
/// recovered inside the pipeline and reported per source.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("no sources selected")]
    NoSourcesSelected,

    #[error("not a usable archive path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Picks the retriever for `config.base_url`: local files for a directory
/// or `file://` prefix, HTTP otherwise.
///
/// # Errors
///
/// Returns [`IngestError::Client`] if the HTTP client cannot be built.
pub fn build_retriever(config: &IngestConfig) -> Result<Arc<dyn Retriever>, IngestError> {
    if is_local(&config.base_url) {
        log::info!("Reading archives from {}", config.base_url);
        return Ok(Arc::new(FileRetriever));
    }

    Ok(Arc::new(HttpRetriever::new(
        &config.user_agent,
        config.timeout(),
    )?))
}

/// Builds a pipeline using the configured classifier.
#[must_use]
pub fn build_pipeline(config: &IngestConfig, retriever: Arc<dyn Retriever>) -> Pipeline {
    Pipeline::new(retriever, PipelineOptions::from_config(config))
        .with_classifier(Arc::new(config.classifier.clone()))
}

/// Loads the corpus at `path` if it exists, for `--append` runs.
///
/// # Errors
///
/// Returns [`PersistenceError`] if the file exists but cannot be read.
pub fn load_seed(path: &Path) -> Result<Option<Corpus>, PersistenceError> {
    if !path.is_file() {
        log::info!("No existing corpus at {}, starting fresh", path.display());
        return Ok(None);
    }
    persist::read_corpus(path).map(Some)
}

/// Source-step bar and per-source record spinner for CLI runs.
pub type ProgressBars = (Arc<dyn ProgressCallback>, Arc<dyn ProgressCallback>);

/// Creates the CLI progress bars for a run over `source_count` sources.
#[must_use]
pub fn progress_bars(multi: &MultiProgress, source_count: usize) -> ProgressBars {
    (
        IndicatifProgress::steps_bar(multi, "Sources", source_count as u64),
        IndicatifProgress::records_bar(multi, "Records"),
    )
}

/// Runs the full pipeline over `sources` and writes the corpus to
/// `config.output`.
///
/// With `append`, an existing corpus at the output path is extended rather
/// than replaced.
///
/// # Errors
///
/// Returns [`IngestError`] if no sources are given, the HTTP client cannot
/// be built, the existing corpus cannot be read, or the final write fails.
pub async fn run_ingest(
    config: &IngestConfig,
    sources: &[SourceDescriptor],
    append: bool,
    progress: Option<ProgressBars>,
) -> Result<RunOutcome, IngestError> {
    if sources.is_empty() {
        return Err(IngestError::NoSourcesSelected);
    }

    let seed = if append {
        load_seed(&config.output)?
    } else {
        None
    };

    let mut pipeline = build_pipeline(config, build_retriever(config)?);
    if let Some((source_progress, record_progress)) = progress {
        pipeline = pipeline.with_progress(source_progress, record_progress);
    }

    log::info!(
        "Ingesting {} source(s): {}",
        sources.len(),
        sources
            .iter()
            .map(|s| s.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    pipeline.run(sources, seed, &config.output).await
}

/// Runs extraction, parsing, and classification over one local archive
/// and returns the statistics without persisting anything.
///
/// # Errors
///
/// Returns [`IngestError::InvalidPath`] if `path` has no UTF-8 file name.
pub async fn inspect_archive(config: &IngestConfig, path: &Path) -> Result<RunOutcome, IngestError> {
    let invalid = || IngestError::InvalidPath(path.to_path_buf());

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    let label = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let base_url = format!("{}/", dir.to_str().ok_or_else(invalid)?);

    let options = PipelineOptions {
        base_url,
        throttle: Duration::ZERO,
        ..PipelineOptions::from_config(config)
    };
    let pipeline = Pipeline::new(Arc::new(FileRetriever), options)
        .with_classifier(Arc::new(config.classifier.clone()));

    Ok(pipeline
        .ingest(&[SourceDescriptor::new(label, file_name)], None)
        .await)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use masters_game_models::SourceOutcome;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("masters-lib-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_zip(path: &Path, pgn: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("games.pgn", options).unwrap();
        zip.write_all(pgn.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    const PGN: &str = "[White \"Tal, Mikhail\"]\n[Black \"Botvinnik, Mikhail\"]\n\
                       [Date \"1960.03.15\"]\n[Result \"1-0\"]\n\n1. e4 e6 1-0\n\n\
                       [White \"?\"]\n[Black \"Unknown\"]\n\n1. d4 *\n";

    fn local_config(dir: &Path) -> IngestConfig {
        let mut config = IngestConfig::parse(
            r#"
throttle_ms = 0

[[sources]]
label = "Tal"
archive = "Tal.zip"

[[sources]]
label = "Missing"
archive = "Missing.zip"
"#,
        )
        .unwrap();
        config.base_url = format!("{}/", dir.display());
        config.output = dir.join("out").join("masters.json");
        config
    }

    #[tokio::test]
    async fn inspects_a_local_archive() {
        let dir = temp_dir("inspect");
        let archive = dir.join("Tal.zip");
        write_zip(&archive, PGN);

        let config = IngestConfig::parse("[[sources]]\nlabel = \"x\"\narchive = \"x.zip\"").unwrap();
        let outcome = inspect_archive(&config, &archive).await.unwrap();

        assert_eq!(outcome.reports[0].source.label, "Tal");
        assert_eq!(outcome.totals.total, 2);
        assert_eq!(outcome.totals.accepted, 1);
        assert_eq!(outcome.totals.rejected, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn runs_offline_and_appends() {
        let dir = temp_dir("append");
        write_zip(&dir.join("Tal.zip"), PGN);
        let config = local_config(&dir);

        let first = run_ingest(&config, &config.sources, false, None).await.unwrap();
        assert_eq!(first.totals.accepted, 1);
        assert!(matches!(
            first.reports[1].outcome,
            SourceOutcome::Skipped { .. }
        ));
        assert!(config.output.is_file());

        let second = run_ingest(&config, &config.sources, true, None).await.unwrap();
        assert_eq!(second.totals.accepted, 0);
        assert_eq!(second.totals.duplicates, 1);
        assert_eq!(second.corpus.records.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn empty_selection_is_an_error() {
        let dir = temp_dir("empty");
        let config = local_config(&dir);
        let err = run_ingest(&config, &[], false, None).await.unwrap_err();
        assert!(matches!(err, IngestError::NoSourcesSelected));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_seed_starts_fresh() {
        assert!(load_seed(Path::new("/nonexistent/masters.json")).unwrap().is_none());
    }
}
