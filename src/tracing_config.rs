//! Tracing configuration module for structured logging and observability
//!
//! The library only emits spans and events (see [`spans`] and [`events`]).
//! Installing a subscriber is left to applications; the CLI does it through
//! [`TracingConfig`], which is available with the `cli` feature.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output for CI environments
    Compact,
    /// JSON structured logging for production environments
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for run correlation
    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Filter directives in effect: the explicit filter, else the verbosity level
    pub fn filter_directives(&self) -> &str {
        self.env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter())
    }

    /// Initialize the global tracing subscriber
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.filter_directives())?;

        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_level(true)
                    .compact();

                registry.with(fmt_layer).try_init()?;
            },

            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact();

                registry.with(fmt_layer).try_init()?;
            },

            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);

                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, "Background removal session started");
        }

        Ok(())
    }
}

/// Initialize tracing with CLI-friendly defaults and a fresh session id
///
/// A non-empty `RUST_LOG` takes precedence over `verbosity`.
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, format: TracingFormat) -> anyhow::Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let env_filter = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    cli_config(verbosity, format, env_filter)
        .with_session_id(session_id)
        .init()
}

#[cfg(feature = "cli")]
fn cli_config(verbosity: u8, format: TracingFormat, env_filter: Option<String>) -> TracingConfig {
    let config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format);

    match env_filter.filter(|directives| !directives.trim().is_empty()) {
        Some(directives) => config.with_env_filter(directives),
        None => config,
    }
}

/// Span creation helpers
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one job from spawn to settlement
    pub fn job(job_id: &str, mode: &str, source: &str, destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "job",
            job_id = %job_id,
            mode = %mode,
            source = %source,
            destination = %destination.display()
        )
    }

    /// Span for a CLI run over several inputs
    pub fn batch(job_count: usize, max_concurrent: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "batch",
            job_count = %job_count,
            max_concurrent = %max_concurrent
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use crate::process::ExitReason;
    use std::time::Duration;
    use tracing::{debug, error, info, warn};

    pub fn process_spawned(tool: &str, pid: Option<u32>, timeout: Option<Duration>) {
        debug!(
            tool = %tool,
            pid = ?pid,
            timeout_ms = ?timeout.map(|t| t.as_millis()),
            "Process spawned"
        );
    }

    pub fn process_exited(tool: &str, pid: Option<u32>, reason: ExitReason) {
        debug!(tool = %tool, pid = ?pid, status = %reason, "Process exited");
    }

    pub fn deadline_elapsed(tool: &str, pid: Option<u32>, timeout: Option<Duration>) {
        warn!(
            tool = %tool,
            pid = ?pid,
            timeout_ms = ?timeout.map(|t| t.as_millis()),
            "Deadline elapsed, killing process"
        );
    }

    /// A still-running process was killed during job teardown
    pub fn teardown(tool: &str, pid: Option<u32>) {
        debug!(tool = %tool, pid = ?pid, "Process killed during teardown");
    }

    pub fn job_settled(job_id: &str, elapsed: Duration, error: Option<&dyn std::error::Error>) {
        let elapsed_ms = elapsed.as_millis();
        match error {
            None => info!(job_id = %job_id, elapsed_ms = %elapsed_ms, "Job succeeded"),
            Some(error) => warn!(
                job_id = %job_id,
                elapsed_ms = %elapsed_ms,
                error = %error,
                "Job failed"
            ),
        }
    }

    /// Log an error with context
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(error = %error, context = %context, "Operation failed");
    }
}
