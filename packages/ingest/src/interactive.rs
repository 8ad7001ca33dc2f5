#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the ingest tool.
//!
//! Provides a `dialoguer` front end for picking sources and run options
//! without memorizing CLI flags.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, MultiSelect, Select};
use masters_cli_utils::MultiProgress;

use crate::config::{IngestConfig, Overrides};
use crate::report::{render_sources, render_summary};

/// Top-level actions available in the ingest interactive menu.
enum IngestAction {
    RunSources,
    ListSources,
    InspectArchive,
}

impl IngestAction {
    const ALL: &[Self] = &[Self::RunSources, Self::ListSources, Self::InspectArchive];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunSources => "Ingest sources",
            Self::ListSources => "List sources",
            Self::InspectArchive => "Inspect a local archive",
        }
    }
}

/// Runs the interactive menu, prompting the user to select and configure
/// an ingest operation.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected operation fails.
pub async fn run(
    mut config: IngestConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = IngestAction::ALL.iter().map(IngestAction::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match IngestAction::ALL[idx] {
        IngestAction::RunSources => run_sources(&mut config, multi).await?,
        IngestAction::ListSources => print!("{}", render_sources(&config.sources, &config.base_url)),
        IngestAction::InspectArchive => inspect(&config).await?,
    }

    Ok(())
}

/// Prompts for sources and run options, then runs the pipeline over the
/// selection.
async fn run_sources(
    config: &mut IngestConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<String> = config
        .sources
        .iter()
        .map(|s| format!("{} ({})", s.label, s.archive_name))
        .collect();

    let selected = MultiSelect::new()
        .with_prompt("Select sources to ingest (space=toggle, a=all, enter=confirm)")
        .items(&labels)
        .max_length(20)
        .interact()?;

    if selected.is_empty() {
        println!("No sources selected.");
        return Ok(());
    }

    let throttle_ms = prompt_u64("Delay between sources (ms)", config.throttle_ms)?;
    let append = Confirm::new()
        .with_prompt(format!(
            "Append to existing corpus at {}?",
            config.output.display()
        ))
        .default(true)
        .interact()?;

    Overrides {
        throttle_ms: Some(throttle_ms),
        ..Overrides::default()
    }
    .apply(config)?;

    let sources: Vec<_> = selected
        .iter()
        .map(|&i| config.sources[i].clone())
        .collect();

    let progress = crate::progress_bars(multi, sources.len());
    let outcome = crate::run_ingest(config, &sources, append, Some(progress)).await?;
    print!("{}", render_summary(&outcome));

    Ok(())
}

/// Prompts for an archive path and prints its statistics.
async fn inspect(config: &IngestConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path: String = Input::new()
        .with_prompt("Path to archive (.zip, .zst, or .pgn)")
        .interact_text()?;

    let outcome = crate::inspect_archive(config, &PathBuf::from(path.trim())).await?;
    print!("{}", render_summary(&outcome));

    Ok(())
}

/// Prompts for a number, falling back to `default` on empty or invalid
/// input.
fn prompt_u64(prompt: &str, default: u64) -> Result<u64, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()?;

    Ok(input.trim().parse().unwrap_or(default))
}
