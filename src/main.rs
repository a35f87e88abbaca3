//! Novel-Trail main entry point
//!
//! This is the command-line interface for the Novel-Trail chapter downloader.

use anyhow::Context;
use clap::Parser;
use novel_trail::config::{load_config_with_hash, Config, RunParams};
use novel_trail::crawler::{CrawlOrchestrator, RunReport};
use novel_trail::state::{StopIndex, TerminalReason};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Novel-Trail: a sequential chapter downloader
///
/// Starting from a book's info page or first chapter, Novel-Trail follows
/// each chapter's "next" link and saves every chapter as a numbered text
/// file, together with the book's metadata and cover image.
#[derive(Parser, Debug)]
#[command(name = "novel-trail")]
#[command(version)]
#[command(about = "A sequential chapter downloader", long_about = None)]
struct Cli {
    /// Info page or first chapter URL, depending on the site
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Index of the first saved chapter
    #[arg(short, long, default_value_t = 1)]
    start: u32,

    /// Last index to save; -1 crawls until the last chapter
    #[arg(short = 'e', long, default_value_t = -1, allow_negative_numbers = true)]
    stop: i64,

    /// Output directory (default: <root>/<site>/<timestamp>/raw)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Remove existing files in the output directory first
    #[arg(long)]
    reset: bool,

    /// Clean the result files after crawling
    #[arg(long)]
    clean: bool,

    /// Skip the info page and cover image
    #[arg(long)]
    no_info: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let params = RunParams {
        seed_url: cli.url.clone(),
        start_index: cli.start,
        stop_index: StopIndex::from_signed(cli.stop),
        output_dir: cli.output.clone(),
        reset: cli.reset,
        clean: cli.clean,
        with_info: !cli.no_info,
    };

    let orchestrator = CrawlOrchestrator::new(config).context("Failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current chapter");
            on_interrupt.cancel();
        }
    });

    let report = orchestrator
        .run(&params, cancel)
        .await
        .with_context(|| format!("Could not crawl {}", params.seed_url))?;

    print_report(&report);

    if report.summary.reason.is_failed() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("novel_trail=info,warn"),
            1 => EnvFilter::new("novel_trail=debug,info"),
            2 => EnvFilter::new("novel_trail=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn print_report(report: &RunReport) {
    let summary = &report.summary;

    println!("\n=== Novel-Trail Run ===\n");
    println!("Result:           {}", summary.reason);
    println!("Chapters written: {}", summary.chapters_written);
    match summary.last_index {
        Some(last) => println!("Chapter range:    {}..={}", summary.start_index, last),
        None => println!("Chapter range:    none"),
    }
    println!("Pages fetched:    {}", summary.pages_fetched);
    println!("Book info:        {}", yes_no(summary.info_written));
    println!("Cover image:      {}", yes_no(summary.cover_written));
    if let Some(cleanup) = &report.cleanup {
        println!(
            "Cleanup:          {} of {} files changed",
            cleanup.files_changed, cleanup.files_seen
        );
    }
    println!("Output:           {}", report.output_dir.display());

    if let TerminalReason::Failed(_) = summary.reason {
        println!("\nFiles written before the failure were kept; rerun from the next index to resume.");
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
