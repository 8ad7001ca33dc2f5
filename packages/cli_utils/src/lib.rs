#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal progress and logging for the masters binaries.
//!
//! [`IndicatifProgress`] renders pipeline progress through `indicatif`;
//! [`init_logger`] routes `log` output through the same [`MultiProgress`]
//! so log lines and bars do not overwrite each other.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use masters_source::progress::ProgressCallback;

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(120);

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| fallback())
}

/// A [`ProgressCallback`] backed by one `indicatif` bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied when a total arrives for a bar that started without one.
    sized_style: Option<ProgressStyle>,
}

impl IndicatifProgress {
    /// Bar over the sources of a run; the count is known up front.
    #[must_use]
    pub fn steps_bar(
        multi: &MultiProgress,
        message: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::steps(multi, message, total))
    }

    fn steps(multi: &MultiProgress, message: &str, total: u64) -> Self {
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(style(
            "{msg:>12.bold} [{bar:40.green}] {pos}/{len} sources ({elapsed})",
            ProgressStyle::default_bar,
        ));
        bar.set_message(message.to_string());

        Self {
            bar,
            sized_style: None,
        }
    }

    /// Spinner counting parsed records of the current source.
    ///
    /// How many records a source holds is only known once it has been
    /// parsed, so this stays a counter unless a total is set.
    #[must_use]
    pub fn records_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::records(multi, message))
    }

    fn records(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(TICK);
        bar.set_style(style(
            "{spinner:.cyan} {msg} {human_pos} records ({per_sec})",
            ProgressStyle::default_spinner,
        ));
        bar.set_message(message.to_string());

        Self {
            bar,
            sized_style: Some(style(
                "  {msg} [{bar:40.cyan}] {human_pos}/{human_len} ({eta})",
                ProgressStyle::default_bar,
            )),
        }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.reset();
        if let Some(sized) = &self.sized_style {
            self.bar.set_style(sized.clone());
        }
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns
/// the [`MultiProgress`] every bar must be added to.
///
/// Defaults to `info`; `RUST_LOG` overrides it (e.g.
/// `RUST_LOG=masters_ingest=debug` to trace pipeline state changes).
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
