//! The ingestion orchestrator.
//!
//! Sources are processed strictly one at a time:
//!
//! ```text
//! Idle -> Downloading -> Extracting -> Parsing -> Accumulating -> (Throttling | Done)
//!              \______________\________-> SourceFailed -> (Throttling | Done)
//! ```
//!
//! A download or extraction failure skips the source with zero records and
//! the run moves on. Records are consumed in document order, so global
//! indices are assigned deterministically regardless of how the parser's
//! workers are scheduled.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt as _;
use masters_game_models::{
    Corpus, FailedStage, GameBoundary, GameRecord, GameResult, RunStatistics,
    SourceDescriptor, SourceOutcome, SourceReport,
};
use masters_pgn::ParseOptions;
use masters_pgn::stream::ParsedRecord;
use masters_source::archive;
use masters_source::fetch::Retriever;
use masters_source::progress::{ProgressCallback, null_progress};
use masters_source::retry::{RetryPolicy, fetch_with_retry};

use crate::IngestError;
use crate::classify::{Classifier, RatingClassifier, parse_rating};
use crate::config::IngestConfig;
use crate::dedup::{Fingerprinter, HeaderFingerprint, SharedDeduplicationIndex};
use crate::persist;

/// Where the orchestrator is in its per-source sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Downloading,
    Extracting,
    Parsing,
    Accumulating,
    Throttling,
    SourceFailed,
    Done,
}

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub base_url: String,
    pub record_suffix: String,
    /// Awaited between consecutive source attempts.
    pub throttle: Duration,
    pub parse: ParseOptions,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            record_suffix: config.record_suffix.clone(),
            throttle: config.throttle(),
            parse: config.parse_options(),
            retry: config.retry_policy(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub corpus: Corpus,
    /// One entry per source, in processing order.
    pub reports: Vec<SourceReport>,
    /// Sum of every report's statistics.
    pub totals: RunStatistics,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Sources that were abandoned at download or extraction.
    pub fn skipped(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| r.outcome.is_skipped())
    }
}

/// Running accumulator shared by every source of a run.
struct RunState {
    state: PipelineState,
    records: Vec<GameRecord>,
    index: SharedDeduplicationIndex,
    next_index: u64,
}

impl RunState {
    fn new(seed: Option<Corpus>) -> Self {
        let Some(corpus) = seed else {
            return Self {
                state: PipelineState::Idle,
                records: Vec::new(),
                index: SharedDeduplicationIndex::default(),
                next_index: 0,
            };
        };

        log::info!(
            "Continuing from {} existing records ({} fingerprints)",
            corpus.records.len(),
            corpus.index.len()
        );
        let next_index = corpus.next_index();

        Self {
            state: PipelineState::Idle,
            records: corpus.records,
            index: SharedDeduplicationIndex::new(corpus.index),
            next_index,
        }
    }

    fn transition(&mut self, label: &str, next: PipelineState) {
        log::debug!("[{label}] {:?} -> {next:?}", self.state);
        self.state = next;
    }
}

/// Drives sources through retrieval, extraction, parsing, and
/// accumulation.
pub struct Pipeline {
    retriever: Arc<dyn Retriever>,
    classifier: Arc<dyn Classifier>,
    fingerprinter: Arc<dyn Fingerprinter>,
    options: PipelineOptions,
    source_progress: Arc<dyn ProgressCallback>,
    record_progress: Arc<dyn ProgressCallback>,
}

impl Pipeline {
    /// Creates a pipeline with the default [`RatingClassifier`] and
    /// [`HeaderFingerprint`], and no progress reporting.
    #[must_use]
    pub fn new(retriever: Arc<dyn Retriever>, options: PipelineOptions) -> Self {
        Self {
            retriever,
            classifier: Arc::new(RatingClassifier::default()),
            fingerprinter: Arc::new(HeaderFingerprint),
            options,
            source_progress: null_progress(),
            record_progress: null_progress(),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Reports one step per source to `sources` and one per parsed record
    /// to `records`.
    #[must_use]
    pub fn with_progress(
        mut self,
        sources: Arc<dyn ProgressCallback>,
        records: Arc<dyn ProgressCallback>,
    ) -> Self {
        self.source_progress = sources;
        self.record_progress = records;
        self
    }

    /// Runs every source and persists the merged corpus to `output`.
    ///
    /// `seed` is an earlier corpus to extend: its records are kept, its
    /// fingerprints count as already seen, and numbering continues after
    /// its highest index.
    ///
    /// # Errors
    ///
    /// Only a persistence failure is returned. Per-source download and
    /// extraction failures are reported in [`RunOutcome::reports`].
    pub async fn run(
        &self,
        sources: &[SourceDescriptor],
        seed: Option<Corpus>,
        output: &Path,
    ) -> Result<RunOutcome, IngestError> {
        let mut outcome = self.ingest(sources, seed).await;
        let (corpus, _) = persist::write_corpus_async(output.to_path_buf(), outcome.corpus).await?;
        outcome.corpus = corpus;
        Ok(outcome)
    }

    /// Runs every source and returns the accumulated corpus without
    /// writing it anywhere.
    pub async fn ingest(&self, sources: &[SourceDescriptor], seed: Option<Corpus>) -> RunOutcome {
        let start = Instant::now();
        let mut run = RunState::new(seed);
        let mut reports = Vec::with_capacity(sources.len());
        let mut totals = RunStatistics::default();

        self.source_progress.set_total(sources.len() as u64);

        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                run.transition(&source.label, PipelineState::Throttling);
                tokio::time::sleep(self.options.throttle).await;
            }

            log::info!(
                "[{}/{}] {} ({})",
                i + 1,
                sources.len(),
                source.label,
                source.archive_name
            );
            self.source_progress.set_message(source.label.clone());

            let report = self.process_source(source, &mut run).await;
            totals.merge(&report.stats);
            reports.push(report);

            self.source_progress.inc(1);
        }

        run.transition("run", PipelineState::Done);
        self.source_progress
            .finish(format!("{} sources processed", sources.len()));
        self.record_progress.finish_and_clear();

        let elapsed = start.elapsed();
        log::info!(
            "Ingest complete in {:.1}s: {} accepted, {} rejected, {} duplicates of {} records",
            elapsed.as_secs_f64(),
            totals.accepted,
            totals.rejected,
            totals.duplicates,
            totals.total
        );

        RunOutcome {
            corpus: Corpus {
                generated_at: Utc::now(),
                records: run.records,
                index: run.index.into_inner(),
            },
            reports,
            totals,
            elapsed,
        }
    }

    async fn process_source(&self, source: &SourceDescriptor, run: &mut RunState) -> SourceReport {
        let start = Instant::now();
        let label = source.label.as_str();
        let url = source.url(&self.options.base_url);

        let skip = |run: &mut RunState, stage: FailedStage, reason: String| {
            log::error!("[{label}] skipped while {stage}: {reason}");
            run.transition(label, PipelineState::SourceFailed);
            SourceReport {
                source: source.clone(),
                outcome: SourceOutcome::Skipped { stage, reason },
                stats: RunStatistics::default(),
                elapsed: start.elapsed(),
            }
        };

        run.transition(label, PipelineState::Downloading);
        let bytes = match fetch_with_retry(self.retriever.as_ref(), &url, &self.options.retry).await
        {
            Ok(bytes) => bytes,
            Err(failure) => return skip(run, FailedStage::Downloading, failure.to_string()),
        };

        run.transition(label, PipelineState::Extracting);
        let text = match archive::extract(&bytes, &self.options.record_suffix) {
            Ok(text) => text,
            Err(failure) => return skip(run, FailedStage::Extracting, failure.to_string()),
        };
        drop(bytes);

        run.transition(label, PipelineState::Parsing);
        let text: Arc<str> = Arc::from(text);
        let mut records = std::pin::pin!(masters_pgn::parse(Arc::clone(&text), self.options.parse));

        self.record_progress.set_position(0);
        self.record_progress.set_message(format!("{label}: parsing"));

        let mut stats = RunStatistics::default();
        while let Some(parsed) = records.next().await {
            if stats.total == 0 {
                run.transition(label, PipelineState::Accumulating);
            }
            self.accumulate(source, &text, parsed, &mut stats, run);
            self.record_progress.inc(1);
        }

        let elapsed = start.elapsed();
        log::info!(
            "[{label}] {} records: {} accepted, {} rejected, {} duplicates ({:.1}s)",
            stats.total,
            stats.accepted,
            stats.rejected,
            stats.duplicates,
            elapsed.as_secs_f64()
        );

        SourceReport {
            source: source.clone(),
            outcome: SourceOutcome::Completed,
            stats,
            elapsed,
        }
    }

    /// Classifies, deduplicates, and (if both pass) materializes one
    /// record.
    fn accumulate(
        &self,
        source: &SourceDescriptor,
        text: &str,
        parsed: ParsedRecord,
        stats: &mut RunStatistics,
        run: &mut RunState,
    ) {
        let boundary = match parsed {
            Ok(boundary) => boundary,
            Err(e) => {
                log::debug!("[{}] {e}", source.label);
                stats.record_rejected();
                return;
            }
        };

        if !self.classifier.accept(&boundary.header_map) {
            stats.record_rejected();
            return;
        }

        let fingerprint = self.fingerprinter.fingerprint(&boundary.header_map);
        if !run.index.check_and_insert(&fingerprint, run.next_index) {
            stats.record_duplicate();
            return;
        }

        let record = build_record(run.next_index, source, text, &boundary, fingerprint);
        run.records.push(record);
        run.next_index += 1;
        stats.record_accepted();
    }
}

fn build_record(
    index: u64,
    source: &SourceDescriptor,
    text: &str,
    boundary: &GameBoundary,
    fingerprint: String,
) -> GameRecord {
    let tag = |key: &str| boundary.header(key).unwrap_or_default().to_string();
    let optional = |key: &str| {
        boundary
            .header(key)
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != "?")
            .map(ToString::to_string)
    };

    let moves = masters_pgn::extract_moves(text, boundary);

    GameRecord {
        index,
        white: tag("White"),
        black: tag("Black"),
        white_rating: parse_rating(boundary.header("WhiteElo")),
        black_rating: parse_rating(boundary.header("BlackElo")),
        result: GameResult::from_tag(boundary.header("Result").unwrap_or_default()),
        date: tag("Date"),
        event: tag("Event"),
        site: tag("Site"),
        eco_code: optional("ECO"),
        opening_name: optional("Opening"),
        move_text: moves.move_text,
        ply_count: moves.ply_count,
        source_tag: source.label.clone(),
        source_file: source.archive_name.clone(),
        fingerprint,
    }
}
