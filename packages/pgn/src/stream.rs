//! Parallel, order-preserving record parsing.
//!
//! The record ranges of a source are grouped into batches and each batch
//! is parsed on a blocking worker. At most `worker_count` batches are in
//! flight at once, and `buffered` hands completed batches back in dispatch
//! order, so the yielded sequence always follows the document even when
//! later batches finish first.

use std::ops::Range;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt as _};
use masters_game_models::GameBoundary;

use crate::headers::parse_record;
use crate::split::record_ranges;
use crate::{RecordParseError, RecordParseReason};

/// Default number of concurrently parsed batches.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default number of records per dispatched batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Worker-pool sizing for [`parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum batches parsed concurrently (clamped to at least 1).
    pub worker_count: usize,
    /// Records per batch (clamped to at least 1).
    pub batch_size: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// One parsed record, or the reason it was skipped.
pub type ParsedRecord = Result<GameBoundary, RecordParseError>;

/// Splits `text` into records and yields their boundaries in document
/// order.
///
/// A malformed record is yielded as an `Err` in its position; it never
/// ends the stream. Must be polled inside a Tokio runtime.
pub fn parse(text: Arc<str>, options: ParseOptions) -> impl Stream<Item = ParsedRecord> + Send {
    let worker_count = options.worker_count.max(1);
    let batch_size = options.batch_size.max(1);

    let ranges = record_ranges(&text);
    log::debug!(
        "parsing {} records in batches of {batch_size} on {worker_count} workers",
        ranges.len()
    );

    let batches: Vec<Vec<Range<usize>>> = ranges.chunks(batch_size).map(<[_]>::to_vec).collect();

    stream::iter(batches)
        .map(move |batch| {
            let text = Arc::clone(&text);
            async move {
                let fallback = batch.clone();
                match tokio::task::spawn_blocking(move || parse_batch(&text, batch)).await {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        log::error!("parser worker failed: {e}");
                        fallback
                            .into_iter()
                            .map(|range| {
                                Err(RecordParseError {
                                    start_offset: range.start,
                                    end_offset: range.end,
                                    reason: RecordParseReason::WorkerFailed(e.to_string()),
                                })
                            })
                            .collect()
                    }
                }
            }
        })
        .buffered(worker_count)
        .flat_map(stream::iter)
}

fn parse_batch(text: &str, batch: Vec<Range<usize>>) -> Vec<ParsedRecord> {
    batch
        .into_iter()
        .map(|range| parse_record(text, range))
        .collect()
}
