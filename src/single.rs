//! Single-process mode: the removal tool reads and writes named files

use crate::config::ToolCommand;
use crate::error::{RembgError, Result};
use crate::job::Job;
use crate::process::{ChildProcess, ExitOutcome, ExitReason};
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Run `<remover> <input> <output>` under the job's deadline
pub(crate) async fn run(job: &Job, input: &Path, remover: &ToolCommand) -> Result<PathBuf> {
    let destination = job.destination();
    let mut process = ChildProcess::spawn(
        remover,
        [input.as_os_str(), destination.as_os_str()],
        Stdio::null(),
        Stdio::null(),
        Some(job.timeout()),
    )
    .map_err(|e| RembgError::spawn(remover.label(), e))?;

    let waited = process.wait().await;
    // reaps the process after a deadline kill, no-op otherwise
    let teardown = process.terminate().await;
    let stderr = process.stderr_text().await;

    match waited? {
        ExitOutcome::DeadlineElapsed => Err(RembgError::timeout(process.tool(), job.timeout())),
        ExitOutcome::Exited(status) if status.success() => {
            teardown?;
            Ok(destination.to_path_buf())
        },
        ExitOutcome::Exited(status) => Err(RembgError::process_exit(
            process.tool(),
            ExitReason::from(status),
            stderr,
        )),
    }
}
