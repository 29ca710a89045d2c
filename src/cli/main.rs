//! rembg-process CLI driver
//!
//! Runs one job per input: `http(s)://` inputs go through the curl -> rembg
//! pipeline, everything else is handed to rembg as a local file.

use super::config::CliConfigBuilder;
use crate::{
    job::Job,
    processor::BackgroundRemover,
    tracing_config::{events, init_cli_tracing, spans, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument};

/// Remove image backgrounds with the rembg CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rembg-process")]
pub struct Cli {
    /// Input images: local paths or http(s) URLs
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Deadline for each rembg run in milliseconds [default: 10000]
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Deadline for each curl download in milliseconds [default: none]
    #[arg(long, value_name = "MS")]
    pub fetch_timeout: Option<u64>,

    /// rembg executable [default: rembg]
    #[arg(long, value_name = "PATH")]
    pub rembg_bin: Option<PathBuf>,

    /// curl executable [default: curl]
    #[arg(long, value_name = "PATH")]
    pub curl_bin: Option<PathBuf>,

    /// Maximum number of jobs running at once (0 = unbounded) [default: 0]
    #[arg(short = 'j', long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Load options from a JSON file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print one JSON report per job on stdout
    #[arg(long)]
    pub json: bool,

    /// Show a spinner per running job
    #[arg(long)]
    pub progress: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;
    debug!(verbosity = %cli.verbose, "Tracing initialized");
    run(cli).await
}

/// Run every job described by `cli`, failing if any of them failed
pub async fn run(cli: Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    let options = CliConfigBuilder::from_cli(&cli).context("Failed to build options")?;
    let jobs = CliConfigBuilder::plan_jobs(&cli, &options).context("Failed to plan jobs")?;
    let max_concurrent = options.max_concurrent_jobs;
    let remover =
        BackgroundRemover::new(options).context("Failed to create background remover")?;

    info!(
        "Starting {} job(s) (max concurrent: {})",
        jobs.len(),
        if max_concurrent == 0 {
            "unbounded".to_string()
        } else {
            max_concurrent.to_string()
        }
    );

    let progress = cli.progress.then(MultiProgress::new);
    let start_time = Instant::now();
    let outcomes = join_all(
        jobs.iter()
            .map(|job| run_job(&remover, job, progress.as_ref(), cli.json)),
    )
    .instrument(spans::batch(jobs.len(), max_concurrent))
    .await;

    let failed = outcomes.iter().filter(|succeeded| !**succeeded).count();
    let total_time = start_time.elapsed();
    info!(
        "Finished {} job(s) in {:.2}s, {} failed",
        jobs.len(),
        total_time.as_secs_f64(),
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} of {} job(s) failed", failed, jobs.len());
    }
    Ok(())
}

/// Run one job and print its outcome; returns whether it succeeded
async fn run_job(
    remover: &BackgroundRemover,
    job: &Job,
    progress: Option<&MultiProgress>,
    json: bool,
) -> bool {
    let spinner = progress.map(|multi| {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("{} ({})", job.source(), job.mode()));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    });

    let (result, report) = remover.run_with_report(job).await;
    debug!(job_id = %job.id(), elapsed_ms = %report.elapsed_ms, "Job report ready");

    if let Some(bar) = spinner {
        match &result {
            Ok(path) => bar.finish_with_message(format!("✅ {}", path.display())),
            Err(e) => bar.abandon_with_message(format!("❌ {}", e)),
        }
    }

    if json {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => events::error_with_context(&e, "serializing job report"),
        }
    } else {
        match &result {
            Ok(path) => println!("✅ {} -> {}", job.source(), path.display()),
            Err(e) => eprintln!("❌ {}: {}", job.source(), e),
        }
    }

    result.is_ok()
}
