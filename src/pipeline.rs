//! Pipeline mode: `fetcher -> remover -> file`
//!
//! The fetcher's stdout becomes the remover's stdin (an OS pipe, nothing is
//! buffered here) and the remover's stdout is copied into the destination
//! file. Process and sink events are fed one at a time into
//! [`PipelineMonitor`], which decides when and how the job settles. Whatever
//! the outcome, both processes are killed if still running and reaped before
//! the job returns.

use crate::config::ToolCommand;
use crate::error::{RembgError, Result};
use crate::job::Job;
use crate::process::{ChildProcess, ExitOutcome, ExitReason};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdout;
use tokio::time::Instant;
use tracing::{info, warn};

/// Something that happened to one part of the pipeline
#[derive(Debug)]
pub(crate) enum PipelineEvent {
    FetcherExited(io::Result<ExitOutcome>),
    RemoverExited(io::Result<ExitOutcome>),
    SinkFinished(io::Result<u64>),
    /// The remover's deadline passed while its stdout was still open
    SinkDeadlineElapsed,
}

/// How a pipeline settled
#[derive(Debug)]
pub(crate) enum Terminal {
    Succeeded { bytes_written: u64 },
    FetchFailed(ExitReason),
    FetchTimedOut,
    RemoverFailed(ExitReason),
    RemoverTimedOut,
    SinkFailed(io::Error),
    WaitFailed(io::Error),
}

#[derive(Debug)]
pub(crate) enum Step {
    Continue,
    Settle(Terminal),
}

/// Pipeline state machine: `Running` until the first terminal transition
///
/// Success needs all three parts finished cleanly. Any failure settles
/// immediately. Nothing is reported after the first settlement.
#[derive(Debug, Default)]
pub(crate) struct PipelineMonitor {
    fetcher_exited: bool,
    remover_exited: bool,
    bytes_written: Option<u64>,
    settled: bool,
}

impl PipelineMonitor {
    pub(crate) fn fetcher_running(&self) -> bool {
        !self.fetcher_exited
    }

    pub(crate) fn remover_running(&self) -> bool {
        !self.remover_exited
    }

    pub(crate) fn sink_open(&self) -> bool {
        self.bytes_written.is_none()
    }

    pub(crate) fn apply(&mut self, event: PipelineEvent) -> Step {
        if self.settled {
            return Step::Continue;
        }

        let step = match event {
            PipelineEvent::FetcherExited(Err(e)) | PipelineEvent::RemoverExited(Err(e)) => {
                Step::Settle(Terminal::WaitFailed(e))
            },
            PipelineEvent::FetcherExited(Ok(ExitOutcome::DeadlineElapsed)) => {
                Step::Settle(Terminal::FetchTimedOut)
            },
            PipelineEvent::FetcherExited(Ok(ExitOutcome::Exited(status))) => {
                if status.success() {
                    self.fetcher_exited = true;
                    self.completion()
                } else {
                    Step::Settle(Terminal::FetchFailed(status.into()))
                }
            },
            PipelineEvent::RemoverExited(Ok(ExitOutcome::DeadlineElapsed)) => {
                Step::Settle(Terminal::RemoverTimedOut)
            },
            PipelineEvent::RemoverExited(Ok(ExitOutcome::Exited(status))) => {
                if status.success() {
                    self.remover_exited = true;
                    self.completion()
                } else {
                    Step::Settle(Terminal::RemoverFailed(status.into()))
                }
            },
            PipelineEvent::SinkFinished(Ok(bytes_written)) => {
                self.bytes_written = Some(bytes_written);
                self.completion()
            },
            PipelineEvent::SinkFinished(Err(e)) => Step::Settle(Terminal::SinkFailed(e)),
            PipelineEvent::SinkDeadlineElapsed => Step::Settle(Terminal::RemoverTimedOut),
        };

        if matches!(step, Step::Settle(_)) {
            self.settled = true;
        }
        step
    }

    fn completion(&self) -> Step {
        match self.bytes_written {
            Some(bytes_written) if self.fetcher_exited && self.remover_exited => {
                Step::Settle(Terminal::Succeeded { bytes_written })
            },
            _ => Step::Continue,
        }
    }
}

/// Fetch `url`, pipe it through the remover and stream the result to the
/// job's destination
pub(crate) async fn run(
    job: &Job,
    url: &str,
    remover: &ToolCommand,
    fetcher: &ToolCommand,
    fetch_timeout: Option<Duration>,
) -> Result<PathBuf> {
    let destination = job.destination().to_path_buf();

    let mut fetch = ChildProcess::spawn(fetcher, [url], Stdio::null(), Stdio::piped(), fetch_timeout)
        .map_err(|e| RembgError::spawn(fetcher.label(), e))?;

    let mut remove = match spawn_remover(&mut fetch, remover, job.timeout()) {
        Ok(remove) => remove,
        Err(err) => {
            teardown([&mut fetch]).await;
            return Err(err);
        },
    };

    let Some(removed) = remove.take_stdout() else {
        teardown([&mut fetch, &mut remove]).await;
        return Err(RembgError::internal("remover stdout was not piped"));
    };

    // a descendant of the remover can hold its stdout open after it exits
    let sink_deadline = remove
        .deadline()
        .unwrap_or_else(|| Instant::now() + job.timeout());

    let terminal = {
        let sink = write_to_file(removed, &destination);
        tokio::pin!(sink);

        let mut monitor = PipelineMonitor::default();
        loop {
            let event = tokio::select! {
                biased;
                outcome = fetch.wait(), if monitor.fetcher_running() => {
                    PipelineEvent::FetcherExited(outcome)
                },
                outcome = remove.wait(), if monitor.remover_running() => {
                    PipelineEvent::RemoverExited(outcome)
                },
                written = &mut sink, if monitor.sink_open() => PipelineEvent::SinkFinished(written),
                () = tokio::time::sleep_until(sink_deadline), if monitor.sink_open() => {
                    PipelineEvent::SinkDeadlineElapsed
                },
            };

            if let Step::Settle(terminal) = monitor.apply(event) {
                break terminal;
            }
        }
    };

    teardown([&mut fetch, &mut remove]).await;

    match terminal {
        Terminal::Succeeded { bytes_written } => {
            info!(
                bytes_written = %bytes_written,
                destination = %destination.display(),
                "Pipeline output written"
            );
            Ok(destination)
        },
        Terminal::FetchFailed(status) => {
            let stderr = fetch.stderr_text().await;
            Err(RembgError::fetch(fetch.tool(), status, stderr))
        },
        Terminal::FetchTimedOut => Err(RembgError::timeout(
            fetch.tool(),
            fetch.timeout().unwrap_or_default(),
        )),
        Terminal::RemoverFailed(status) => {
            let stderr = remove.stderr_text().await;
            Err(RembgError::remover_exit(remove.tool(), status, stderr))
        },
        Terminal::RemoverTimedOut => Err(RembgError::timeout(remove.tool(), job.timeout())),
        Terminal::SinkFailed(e) => Err(RembgError::sink_write(destination, e)),
        Terminal::WaitFailed(e) => Err(RembgError::Io(e)),
    }
}

/// Spawn the remover reading from the fetcher's stdout
fn spawn_remover(
    fetch: &mut ChildProcess,
    remover: &ToolCommand,
    timeout: Duration,
) -> Result<ChildProcess> {
    let fetched = fetch
        .take_stdout()
        .ok_or_else(|| RembgError::internal("fetcher stdout was not piped"))?;
    let stdin: Stdio = fetched.try_into()?;

    ChildProcess::spawn(
        remover,
        std::iter::empty::<&str>(),
        stdin,
        Stdio::piped(),
        Some(timeout),
    )
    .map_err(|e| RembgError::spawn(remover.label(), e))
}

async fn write_to_file(mut source: ChildStdout, path: &Path) -> io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let written = tokio::io::copy(&mut source, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

/// Kill and reap every process that is still running
async fn teardown<const N: usize>(processes: [&mut ChildProcess; N]) {
    for process in processes {
        if let Err(e) = process.terminate().await {
            warn!(
                tool = %process.tool(),
                pid = ?process.pid(),
                error = %e,
                "Failed to terminate process"
            );
        }
    }
}
