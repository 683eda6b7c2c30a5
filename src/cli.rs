//! Command-line surface and run driver.
//!
//! Loads the configuration named on the command line, wires up logging and
//! the Ctrl-C handler, runs the pipeline, and maps the result to an exit
//! status: 0 for a failure-free run, 1 for any failure, 130 when the user
//! cancelled.

use std::path::PathBuf;

use clap::Parser;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;
use crate::error::Error;
use crate::pipeline::{CancelFlag, Pipeline, StatsSnapshot};

/// Exit status for user cancellation (128 + SIGINT).
pub const EXIT_CANCELLED: u8 = 130;

/// Convert a FLAC library to AAC with tags, artwork and loudness metadata
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Scan and report the plan without converting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Exit status for a finished run.
pub fn exit_code(stats: &StatsSnapshot) -> u8 {
    if stats.failed == 0 { 0 } else { 1 }
}

/// Run the conversion described by the CLI arguments.
pub fn run(cli: &Cli) -> anyhow::Result<u8> {
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the config file, so this error can
            // only go to stderr directly.
            eprintln!("Error: {e}");
            return Ok(1);
        }
    };

    init_logging(&config.processing.log_level);

    info!("flacpress starting");
    info!("input: {:?}", config.paths.input_dir);
    info!("output: {:?}", config.paths.output_dir);
    info!("workers: {}", config.processing.workers);

    let rt = Runtime::new()?;
    let cancel = CancelFlag::new();
    let pipeline = Pipeline::new(config, cli.dry_run, cancel.clone());
    let stats = pipeline.stats();

    let result = rt.block_on(async {
        let watcher_flag = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight work");
                watcher_flag.set();
            }
        });

        pipeline.run().await
    });

    match result {
        Ok(snapshot) => {
            print_summary(&snapshot);
            Ok(exit_code(&snapshot))
        }
        Err(Error::Cancelled) => {
            warn!("operation cancelled by user");
            print_summary(&stats.snapshot());
            Ok(EXIT_CANCELLED)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(1)
        }
    }
}

fn init_logging(level: &str) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("flacpress={level}").parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn print_summary(stats: &StatsSnapshot) {
    info!("============================================================");
    info!("Conversion Summary");
    info!("============================================================");
    info!("Total files processed: {}", stats.total_files);
    info!("Successful: {}", stats.successful);
    info!("Failed: {}", stats.failed);
    info!("Skipped: {}", stats.skipped);
    info!("Albums processed: {}", stats.albums_processed);
    info!("============================================================");
}
