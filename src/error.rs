//! Error types for background removal jobs

use crate::process::ExitReason;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for background removal jobs
pub type Result<T> = std::result::Result<T, RembgError>;

/// Substrings in a tool's stderr that mean the shell could not resolve it
const NOT_FOUND_MARKERS: [&str; 2] = ["command not found", "is not recognized"];

/// Every way a background removal job can fail
#[derive(Error, Debug)]
pub enum RembgError {
    /// The OS could not create the process (binary missing or not executable)
    #[error("Failed to start {tool} process. Is it installed and in your PATH? Original error: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but reported that the tool itself could not be found
    #[error("{tool} command not found. Please ensure Python and rembg are installed and in your system's PATH.")]
    ToolNotFound { tool: String, stderr: String },

    /// The process ran and exited unsuccessfully
    #[error("{tool} process exited with {status}. Stderr: {stderr}")]
    ProcessExit {
        tool: String,
        status: ExitReason,
        stderr: String,
    },

    /// The process outlived its deadline and was killed
    #[error("{tool} process timed out after {timeout_ms}ms.")]
    Timeout { tool: String, timeout_ms: u128 },

    /// The fetch stage of a URL pipeline exited unsuccessfully
    #[error("{tool} process exited with {status}. Stderr: {stderr}")]
    Fetch {
        tool: String,
        status: ExitReason,
        stderr: String,
    },

    /// The destination file could not be created or written
    #[error("Failed to write to output file {}. Error: {source}", path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid options or job arguments
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Waiting on or wiring up a process failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RembgError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    pub fn spawn<S: Into<String>>(tool: S, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn timeout<S: Into<String>>(tool: S, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            tool: tool.into(),
            timeout_ms: timeout.as_millis(),
        }
    }

    pub fn fetch<S: Into<String>>(tool: S, status: ExitReason, stderr: String) -> Self {
        Self::Fetch {
            tool: tool.into(),
            status,
            stderr,
        }
    }

    pub fn sink_write<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::SinkWrite {
            path: path.into(),
            source,
        }
    }

    /// Classify an unsuccessful exit of the removal tool
    ///
    /// Falls back to [`RembgError::ToolNotFound`] when the captured stderr
    /// shows the shell could not resolve the tool.
    pub fn process_exit<S: Into<String>>(tool: S, status: ExitReason, stderr: String) -> Self {
        if NOT_FOUND_MARKERS.iter().any(|marker| stderr.contains(marker)) {
            return Self::ToolNotFound {
                tool: tool.into(),
                stderr,
            };
        }

        Self::ProcessExit {
            tool: tool.into(),
            status,
            stderr,
        }
    }

    /// Unsuccessful exit of the removal stage of a pipeline
    ///
    /// Unlike [`RembgError::process_exit`], stderr is never reclassified.
    pub fn remover_exit<S: Into<String>>(tool: S, status: ExitReason, stderr: String) -> Self {
        Self::ProcessExit {
            tool: tool.into(),
            status,
            stderr,
        }
    }

    /// Captured stderr text, for the variants that carry it
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ToolNotFound { stderr, .. }
            | Self::ProcessExit { stderr, .. }
            | Self::Fetch { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Whether the failure was a deadline rather than a tool error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
