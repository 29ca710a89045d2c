//! Reusable background removal front end
//!
//! [`BackgroundRemover`] holds validated [`RemovalOptions`] and an optional
//! cap on how many jobs run at once. Every job spawns up to two native
//! processes, so callers fanning out over many inputs should set
//! `max_concurrent_jobs`. Clones share the same cap.

use crate::config::RemovalOptions;
use crate::error::{RembgError, Result};
use crate::job::{Job, JobReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BackgroundRemover {
    options: Arc<RemovalOptions>,
    permits: Option<Arc<Semaphore>>,
}

impl BackgroundRemover {
    /// Validate `options` and build a remover
    pub fn new(options: RemovalOptions) -> Result<Self> {
        options.validate()?;

        let permits = match options.max_concurrent_jobs {
            0 => None,
            limit => Some(Arc::new(Semaphore::new(limit))),
        };

        Ok(Self {
            options: Arc::new(options),
            permits,
        })
    }

    pub fn options(&self) -> &RemovalOptions {
        &self.options
    }

    /// Jobs that may start right now without waiting (None when unbounded)
    pub fn available_slots(&self) -> Option<usize> {
        self.permits.as_ref().map(|permits| permits.available_permits())
    }

    /// Remove the background of a local image
    ///
    /// Resolves with the absolute output path.
    pub async fn remove_background<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<PathBuf> {
        let job = Job::local(input, output, self.options.timeout())?;
        self.run(&job).await
    }

    /// Fetch an image from `url` and remove its background
    ///
    /// Resolves with the absolute output path.
    pub async fn remove_background_from_url<Q: AsRef<Path>>(
        &self,
        url: &str,
        output: Q,
    ) -> Result<PathBuf> {
        let job = Job::remote(url, output, self.options.timeout())?;
        self.run(&job).await
    }

    /// Run a prepared job, waiting for a free slot first if capped
    pub async fn run(&self, job: &Job) -> Result<PathBuf> {
        let _permit = self.acquire(job).await?;
        job.run(&self.options).await
    }

    /// Like [`BackgroundRemover::run`], also returning a report
    pub async fn run_with_report(&self, job: &Job) -> (Result<PathBuf>, JobReport) {
        let _permit = match self.acquire(job).await {
            Ok(permit) => permit,
            Err(err) => {
                let result = Err(err);
                let report =
                    JobReport::new(job, chrono::Utc::now(), std::time::Duration::ZERO, &result);
                return (result, report);
            },
        };
        job.run_with_report(&self.options).await
    }

    async fn acquire(&self, job: &Job) -> Result<Option<SemaphorePermit<'_>>> {
        let Some(permits) = &self.permits else {
            return Ok(None);
        };

        if permits.available_permits() == 0 {
            debug!(job_id = %job.id(), "Waiting for a free job slot");
        }

        permits
            .acquire()
            .await
            .map(Some)
            .map_err(|_| RembgError::internal("job limiter was closed"))
    }
}
