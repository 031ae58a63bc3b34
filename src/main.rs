//! rmtree - Remove a directory tree concurrently, with progress.
//!
//! Usage:
//!   rmtree PATH                    Delete PATH and everything below it
//!   rmtree PATH --batch-size 64    Read directories 64 entries at a time
//!   rmtree PATH --format json      Print the final summary as JSON
//!   rmtree --help                  Show help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rmtree_core::{DeleteConfig, IoPriority};
use rmtree_ops::{DeleteEvent, DeleteOutcome, TreeDeleter, start_delete};

#[derive(Parser)]
#[command(
    name = "rmtree",
    version,
    about = "Remove a directory tree concurrently",
    long_about = "rmtree deletes a directory and everything below it, reading \
                  directories in batches while files and subdirectories are \
                  removed concurrently.\n\n\
                  Symlinks are removed, never followed. Press Ctrl-C to stop \
                  issuing new deletions."
)]
struct Cli {
    /// Directory to delete
    path: PathBuf,

    /// Entries read per directory batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Milliseconds between progress lines
    #[arg(short = 'i', long)]
    progress_interval: Option<u64>,

    /// I/O priority hint passed to the filesystem
    #[arg(long, allow_hyphen_values = true)]
    priority: Option<i32>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not print progress lines
    #[arg(short, long)]
    quiet: bool,

    /// Output format for the final summary
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let deleter = TreeDeleter::local().with_config(config);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            ctrl_c.cancel();
        }
    });

    let outcome = run(deleter, cli.path.clone(), cancel, cli.quiet).await?;
    let rendered = render(&outcome, cli.format)?;

    match (outcome.is_success(), cli.format) {
        (true, _) | (false, OutputFormat::Json) => println!("{rendered}"),
        (false, OutputFormat::Text) => eprintln!("{rendered}"),
    }

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Drive a background deletion to completion, printing progress lines.
async fn run(
    deleter: TreeDeleter,
    path: PathBuf,
    cancel: CancellationToken,
    quiet: bool,
) -> Result<DeleteOutcome> {
    let mut events = start_delete(deleter, path.clone(), cancel);
    let mut outcome = None;
    while let Some(event) = events.recv().await {
        match event {
            DeleteEvent::Progress(progress) => {
                if !quiet {
                    eprintln!("{progress} ({:.0}/s)", progress.entries_per_second());
                }
            }
            DeleteEvent::Complete(complete) => outcome = Some(complete),
        }
    }

    outcome.ok_or_else(|| eyre!("Deletion of {} ended without a result", path.display()))
}

/// Merge the config file with command line overrides.
fn load_config(cli: &Cli) -> Result<DeleteConfig> {
    let mut config = match &cli.config {
        Some(path) => DeleteConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DeleteConfig::load_default().context("Failed to load user config")?,
    };

    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(interval) = cli.progress_interval {
        config.progress_interval_ms = interval;
    }
    if let Some(priority) = cli.priority {
        config.priority = IoPriority::new(priority);
    }

    config.validate()?;
    Ok(config)
}

/// Format the final summary.
fn render(outcome: &DeleteOutcome, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => outcome.summary(),
        OutputFormat::Json => serde_json::to_string_pretty(outcome)?,
    })
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
