#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # rembg-process
//!
//! Async orchestration of the [`rembg`](https://github.com/danielgatis/rembg)
//! command-line tool. The crate does no image processing of its own: it
//! spawns `rembg` (and `curl` for remote images), wires up their stdio,
//! enforces a deadline and turns exit codes into a single [`Result`].
//!
//! ## Modes
//!
//! - **Single-process**: `rembg i <input> <output>` for local files.
//! - **Pipeline**: `curl -sL <url> | rembg i > <output>` for remote images,
//!   streamed through an OS pipe and into the destination file without
//!   buffering the image in memory.
//!
//! Each call settles exactly once, and every process it spawned has been
//! killed (if needed) and reaped by then. Partially written output files are
//! left in place on failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rembg_process::{remove_background, remove_background_from_url, RemovalOptions};
//!
//! # async fn example() -> rembg_process::Result<()> {
//! let options = RemovalOptions::builder().timeout_ms(30_000).build()?;
//!
//! let local = remove_background("cat.jpg", "cat-nobg.png", &options).await?;
//! println!("saved {}", local.display());
//!
//! let remote = remove_background_from_url(
//!     "https://upload.wikimedia.org/wikipedia/commons/4/4d/Cat_November_2010-1a.jpg",
//!     "remote-cat-nobg.png",
//!     &options,
//! )
//! .await?;
//! println!("saved {}", remote.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Many inputs
//!
//! Jobs share nothing and are unbounded by default. Use
//! [`BackgroundRemover`] with `max_concurrent_jobs` to cap how many run at
//! once:
//!
//! ```rust,no_run
//! use rembg_process::{BackgroundRemover, RemovalOptions};
//!
//! # async fn example() -> rembg_process::Result<()> {
//! let remover = BackgroundRemover::new(
//!     RemovalOptions::builder().max_concurrent_jobs(4).build()?,
//! )?;
//! let jobs = (1..=16).map(|i| {
//!     let remover = remover.clone();
//!     async move {
//!         remover
//!             .remove_background(format!("in/{i}.jpg"), format!("out/{i}.png"))
//!             .await
//!     }
//! });
//! let results = futures::future::join_all(jobs).await;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `rembg-process` driver binary
//! - `tracing-json`: JSON log output for the driver

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
mod pipeline;
pub mod process;
pub mod processor;
mod single;
pub mod tracing_config;

use std::path::{Path, PathBuf};

// Public API exports
pub use config::{RemovalOptions, RemovalOptionsBuilder, ToolCommand, DEFAULT_TIMEOUT_MS};
pub use error::{RembgError, Result};
pub use job::{Job, JobId, JobMode, JobReport, JobSource};
pub use process::{ChildProcess, ExitOutcome, ExitReason};
pub use processor::BackgroundRemover;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background of a local image with the removal tool
///
/// Runs `rembg i <input> <output>` (or the configured tool) with both paths
/// made absolute, and resolves with the absolute output path.
///
/// # Errors
///
/// - [`RembgError::Spawn`] if the tool cannot be started
/// - [`RembgError::Timeout`] if it runs past `options.timeout_ms`
/// - [`RembgError::ProcessExit`] or [`RembgError::ToolNotFound`] on a
///   non-zero exit
/// - [`RembgError::InvalidConfig`] for invalid options or empty paths
pub async fn remove_background<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &RemovalOptions,
) -> Result<PathBuf> {
    options.validate()?;
    let job = Job::local(input, output, options.timeout())?;
    job.run(options).await
}

/// Fetch a remote image and remove its background
///
/// Pipes `curl -sL <url>` into `rembg i` and streams the result into
/// `output`. Resolves with the absolute output path.
///
/// # Errors
///
/// - [`RembgError::Fetch`] if the fetcher exits unsuccessfully
/// - [`RembgError::Timeout`] if the remover (or, when configured, the
///   fetcher) outlives its deadline
/// - [`RembgError::ProcessExit`] if the remover exits unsuccessfully
/// - [`RembgError::SinkWrite`] if `output` cannot be written
/// - [`RembgError::Spawn`] if either process cannot be started
pub async fn remove_background_from_url<Q: AsRef<Path>>(
    url: &str,
    output: Q,
    options: &RemovalOptions,
) -> Result<PathBuf> {
    options.validate()?;
    let job = Job::remote(url, output, options.timeout())?;
    job.run(options).await
}
