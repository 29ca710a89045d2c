//! Child process handles with spawn-time deadlines and stderr capture
//!
//! A [`ChildProcess`] owns one external process for the lifetime of a job.
//! The deadline is fixed when the process is spawned, stderr is drained into
//! a per-process buffer in the background, and [`ChildProcess::terminate`]
//! kills and reaps the process if it is still running.

use crate::config::ToolCommand;
use crate::tracing_config::events;
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long stderr keeps draining once the process is gone
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

const STDERR_CHUNK_SIZE: usize = 4096;

/// Why a process stopped, in a form suitable for messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    /// Normal exit with a status code
    Code(i32),
    /// Terminated by a signal (Unix only)
    Signal(i32),
    /// The platform reported neither a code nor a signal
    Unknown,
}

impl From<ExitStatus> for ExitReason {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }

        Self::Unknown
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "code {}", code),
            Self::Signal(signal) => write!(f, "signal {}", signal),
            Self::Unknown => write!(f, "unknown status"),
        }
    }
}

/// Result of waiting on a [`ChildProcess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own (or was killed by someone else)
    Exited(ExitStatus),
    /// The spawn-time deadline passed; the process has been sent a kill
    DeadlineElapsed,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(status) if status.success())
    }
}

/// One external process owned by a job
#[derive(Debug)]
pub struct ChildProcess {
    tool: String,
    child: Child,
    pid: Option<u32>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    deadline_elapsed: bool,
    status: Option<ExitStatus>,
    stderr: StderrCapture,
}

impl ChildProcess {
    /// Spawn `tool` with `extra` arguments appended
    ///
    /// stderr is always piped and captured. The process is killed if the
    /// handle is dropped while it is still running.
    pub fn spawn<I, S>(
        tool: &ToolCommand,
        extra: I,
        stdin: Stdio,
        stdout: Stdio,
        timeout: Option<Duration>,
    ) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let label = tool.label();
        let mut child = tool
            .command(extra)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let pid = child.id();
        let stderr = StderrCapture::start(child.stderr.take());

        events::process_spawned(&label, pid, timeout);

        Ok(Self {
            tool: label,
            child,
            pid,
            timeout,
            deadline,
            deadline_elapsed: false,
            status: None,
            stderr,
        })
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The timeout this process was spawned with
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Absolute deadline fixed at spawn, if the process has one
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the piped stdout, if stdout was piped and not taken yet
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Wait for the process to exit or for its deadline to pass
    ///
    /// When the deadline passes the process is sent a kill and
    /// `DeadlineElapsed` is returned; [`ChildProcess::terminate`] reaps it.
    /// Safe to call again, and safe to cancel.
    pub async fn wait(&mut self) -> io::Result<ExitOutcome> {
        if self.deadline_elapsed {
            return Ok(ExitOutcome::DeadlineElapsed);
        }
        if let Some(status) = self.status {
            return Ok(ExitOutcome::Exited(status));
        }

        let status = match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    status = self.child.wait() => status?,
                    () = tokio::time::sleep_until(deadline) => {
                        self.deadline_elapsed = true;
                        events::deadline_elapsed(&self.tool, self.pid, self.timeout);
                        self.child.start_kill()?;
                        return Ok(ExitOutcome::DeadlineElapsed);
                    }
                }
            },
            None => self.child.wait().await?,
        };

        self.status = Some(status);
        events::process_exited(&self.tool, self.pid, ExitReason::from(status));
        Ok(ExitOutcome::Exited(status))
    }

    /// Kill the process if it is still running and reap it
    pub async fn terminate(&mut self) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }

        if let Some(status) = self.child.try_wait()? {
            self.status = Some(status);
            return Ok(());
        }

        self.child.kill().await?;
        self.status = self.child.try_wait()?;
        events::teardown(&self.tool, self.pid);
        Ok(())
    }

    /// Everything the process wrote to stderr, decoded lossily
    pub async fn stderr_text(&mut self) -> String {
        self.stderr.collect(STDERR_DRAIN_GRACE).await
    }
}

/// Background reader accumulating a process's stderr chunk by chunk
#[derive(Debug)]
struct StderrCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl StderrCapture {
    fn start(stderr: Option<ChildStderr>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = stderr.map(|mut stderr| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; STDERR_CHUNK_SIZE];
                loop {
                    match stderr.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buffer
                            .lock()
                            .await
                            .extend_from_slice(chunk.get(..n).unwrap_or(&[])),
                    }
                }
            })
        });

        Self { buffer, reader }
    }

    /// Wait up to `grace` for EOF, then return what was read
    ///
    /// A grandchild that inherited the pipe can keep it open after the
    /// process itself is gone, hence the bound.
    async fn collect(&mut self, grace: Duration) -> String {
        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(grace, &mut reader).await.is_err() {
                reader.abort();
            }
        }
        String::from_utf8_lossy(&self.buffer.lock().await).into_owned()
    }
}

impl Drop for StderrCapture {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
