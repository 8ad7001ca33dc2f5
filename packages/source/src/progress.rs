//! Progress reporting for long-running ingestion.
//!
//! The pipeline reports through [`ProgressCallback`] and never touches a
//! terminal directly. The CLI plugs in `indicatif` bars; tests and library
//! callers use [`NullProgress`].

use std::sync::Arc;

/// Sink for progress updates (sources completed, records parsed).
///
/// Shared as `Arc<dyn ProgressCallback>`, so implementations must be
/// `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Announces how many units the current phase has.
    fn set_total(&self, total: u64);

    /// Moves to an absolute position.
    fn set_position(&self, pos: u64);

    /// Adds `delta` completed units.
    fn inc(&self, delta: u64);

    /// Replaces the status text (e.g., the current source label).
    fn set_message(&self, msg: String);

    /// Ends the phase, leaving `msg` visible.
    fn finish(&self, msg: String);

    /// Ends the phase and removes the indicator.
    fn finish_and_clear(&self);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _: u64) {}
    fn set_position(&self, _: u64) {}
    fn inc(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
    fn finish_and_clear(&self) {}
}

/// A shared [`NullProgress`], the default for [`ProgressCallback`] slots.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
