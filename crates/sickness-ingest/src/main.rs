//! Sickness-absence ingestion - main entry point

use clap::Parser;
use sickness_common::logging::{init_logging, LogConfig};
use sickness_common::types::OverwritePolicy;
use sickness_ingest::pipeline::FileStatus;
use sickness_ingest::{Pipeline, PipelineConfig};
use std::process;
use tracing::error;

/// Ingest NHS sickness-absence statistical releases into the warehouse.
#[derive(Debug, Parser)]
#[command(name = "sickness-ingest", version, about)]
struct Cli {
    /// Fetch new files from the publisher before processing.
    #[arg(long)]
    scrape: bool,

    /// Process staged files under their existing names.
    #[arg(long)]
    no_cleanse: bool,

    /// Leave files in the source directory after loading.
    #[arg(long)]
    no_archive: bool,

    /// How many recent publication periods to scrape.
    #[arg(long)]
    periods: Option<usize>,

    /// Conflict handling for renames: always, never or prompt.
    #[arg(long)]
    overwrite: Option<OverwritePolicy>,

    /// Log debug detail to the console.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // A .env next to the binary supplies DATABASE_URL and friends.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config = log_config.with_filter("debug");
    }
    // The pipeline still works without logging.
    let _ = init_logging(&log_config);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let report = match Pipeline::new(config).run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    for outcome in &report.outcomes {
        match &outcome.status {
            FileStatus::Loaded { rows } => {
                println!("loaded  {} ({} rows)", outcome.filename, rows)
            }
            FileStatus::Skipped { reason } => {
                println!("skipped {} ({})", outcome.filename, reason)
            }
            FileStatus::Failed { error } => {
                println!("failed  {} ({})", outcome.filename, error)
            }
        }
    }

    if report.has_failures() {
        process::exit(1);
    }
}

/// Environment configuration with command-line overrides applied.
fn build_config(cli: &Cli) -> sickness_ingest::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;

    if cli.scrape {
        config.scrape = true;
    }
    if cli.no_cleanse {
        config.cleanse = false;
    }
    if cli.no_archive {
        config.archive = false;
    }
    if let Some(periods) = cli.periods {
        config.periods = periods;
    }
    if let Some(policy) = cli.overwrite {
        config.overwrite_policy = policy;
    }

    Ok(config)
}
