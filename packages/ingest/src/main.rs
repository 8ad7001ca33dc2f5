#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the master-game ingestion tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use masters_ingest::config::{IngestConfig, Overrides};
use masters_ingest::report::{render_sources, render_summary};
use masters_source::registry::{SOURCES_ENV, select_sources};

#[derive(Parser)]
#[command(name = "masters_ingest", about = "Master-game PGN ingestion tool")]
struct Cli {
    /// Path to the TOML config file (default: `masters.toml` if present,
    /// otherwise the built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, parse, and merge every selected source into the corpus
    Run(RunArgs),
    /// List all configured sources
    Sources,
    /// Parse and classify a local archive without writing anything
    Inspect {
        /// Path to a `.zip`, `.zst`, or plain `.pgn` file
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Comma-separated list of source labels to ingest (overrides the
    /// `MASTERS_SOURCES` env var)
    #[arg(long)]
    sources: Option<String>,
    /// Delay between consecutive sources, in milliseconds
    #[arg(long)]
    throttle_ms: Option<u64>,
    /// Number of concurrent parser workers per source
    #[arg(long)]
    workers: Option<usize>,
    /// Number of records per parser batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Extra attempts for transient download failures
    #[arg(long)]
    retries: Option<u32>,
    /// Output path for the corpus JSON
    #[arg(long)]
    output: Option<PathBuf>,
    /// Extend the existing corpus at the output path instead of replacing it
    #[arg(long)]
    append: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = masters_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = IngestConfig::load(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return masters_ingest::interactive::run(config, &multi).await;
    };

    match command {
        Commands::Sources => {
            print!("{}", render_sources(&config.sources, &config.base_url));
        }
        Commands::Inspect { file } => {
            let outcome = masters_ingest::inspect_archive(&config, &file).await?;
            print!("{}", render_summary(&outcome));
        }
        Commands::Run(args) => {
            Overrides {
                throttle_ms: args.throttle_ms,
                worker_count: args.workers,
                batch_size: args.batch_size,
                download_retries: args.retries,
                output: args.output,
            }
            .apply(&mut config)?;

            let sources = select_sources(config.sources.clone(), args.sources);
            if sources.is_empty() {
                return Err(format!(
                    "no sources matched the --sources / {SOURCES_ENV} filter"
                )
                .into());
            }

            let progress = masters_ingest::progress_bars(&multi, sources.len());
            let outcome =
                masters_ingest::run_ingest(&config, &sources, args.append, Some(progress)).await?;

            print!("{}", render_summary(&outcome));
        }
    }

    Ok(())
}
