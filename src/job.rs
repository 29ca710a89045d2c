//! Jobs: one background removal request and its subprocesses
//!
//! A [`Job`] is created per request, runs its subprocess(es) through
//! [`crate::single`] or [`crate::pipeline`], and settles exactly once.

use crate::config::RemovalOptions;
use crate::error::{RembgError, Result};
use crate::tracing_config::{events, spans};
use crate::{pipeline, single};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::Instrument;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier used to correlate logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Where a job reads its image from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    /// Absolute path of a local file, handed to the tool directly
    File(PathBuf),
    /// Remote URL, fetched and streamed into the tool
    Url(String),
}

impl JobSource {
    pub fn mode(&self) -> JobMode {
        match self {
            Self::File(_) => JobMode::SingleProcess,
            Self::Url(_) => JobMode::Pipeline,
        }
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Execution mode a job runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobMode {
    /// One process reading and writing named files
    SingleProcess,
    /// Fetcher piped into the remover, remover streamed into the file
    Pipeline,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleProcess => write!(f, "single-process"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// One background removal request
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    source: JobSource,
    destination: PathBuf,
    timeout: Duration,
}

impl Job {
    /// Job for a local input file
    ///
    /// Both paths are made absolute against the current directory. The input
    /// is not checked for existence; the tool reports a missing file itself.
    pub fn local<P: AsRef<Path>, Q: AsRef<Path>>(
        input: P,
        output: Q,
        timeout: Duration,
    ) -> Result<Self> {
        let input = absolute_path("input", input.as_ref())?;
        Self::new(JobSource::File(input), output.as_ref(), timeout)
    }

    /// Job for a remote URL
    pub fn remote<Q: AsRef<Path>>(url: &str, output: Q, timeout: Duration) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RembgError::invalid_config("image URL must not be empty"));
        }
        if url.starts_with('-') {
            return Err(RembgError::invalid_config(format!(
                "image URL must not start with '-': {}",
                url
            )));
        }
        Self::new(JobSource::Url(url.to_string()), output.as_ref(), timeout)
    }

    fn new(source: JobSource, output: &Path, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(RembgError::invalid_config(
                "timeout must be a positive number of milliseconds",
            ));
        }

        Ok(Self {
            id: JobId::next(),
            source,
            destination: absolute_path("output", output)?,
            timeout,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn source(&self) -> &JobSource {
        &self.source
    }

    /// Absolute output path; this is what a successful job resolves with
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Deadline for the removal process
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn mode(&self) -> JobMode {
        self.source.mode()
    }

    /// Run the job to completion
    ///
    /// Every process the job spawned has exited and been reaped by the time
    /// this returns, whichever way it settles.
    pub async fn run(&self, options: &RemovalOptions) -> Result<PathBuf> {
        let job_id = self.id.to_string();
        let span = spans::job(
            &job_id,
            &self.mode().to_string(),
            &self.source.to_string(),
            &self.destination,
        );

        async {
            let started = Instant::now();
            let result = match &self.source {
                JobSource::File(input) => single::run(self, input, &options.remover).await,
                JobSource::Url(url) => {
                    pipeline::run(
                        self,
                        url,
                        &options.remover,
                        &options.fetcher,
                        options.fetch_timeout(),
                    )
                    .await
                },
            };

            events::job_settled(
                &job_id,
                started.elapsed(),
                result
                    .as_ref()
                    .err()
                    .map(|e| e as &dyn std::error::Error),
            );
            result
        }
        .instrument(span)
        .await
    }

    /// Run the job and summarise the outcome
    pub async fn run_with_report(&self, options: &RemovalOptions) -> (Result<PathBuf>, JobReport) {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.run(options).await;
        let report = JobReport::new(self, started_at, started.elapsed(), &result);
        (result, report)
    }
}

/// Serializable summary of a settled job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub mode: JobMode,
    pub source: JobSource,
    pub destination: PathBuf,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobReport {
    pub fn new(
        job: &Job,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        result: &Result<PathBuf>,
    ) -> Self {
        Self {
            job_id: job.id,
            mode: job.mode(),
            source: job.source.clone(),
            destination: job.destination.clone(),
            started_at,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            succeeded: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

fn absolute_path(role: &str, path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(RembgError::invalid_config(format!(
            "{} path must not be empty",
            role
        )));
    }
    Ok(resolve_absolute(path)?)
}

/// Make `path` absolute against the current directory, folding `.` and `..`
///
/// Purely lexical: symlinks are not followed and nothing needs to exist.
pub fn resolve_absolute(path: &Path) -> std::io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                resolved.pop();
            },
            other => resolved.push(other.as_os_str()),
        }
    }
    Ok(resolved)
}
