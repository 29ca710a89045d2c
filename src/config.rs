//! Configuration types for background removal jobs

use crate::error::{RembgError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default deadline for the removal process, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// An external executable plus the arguments that always precede job arguments
///
/// The removal tool defaults to `rembg i` and the fetcher to `curl -sL`. Job
/// specific arguments (input/output paths, the URL) are appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Program name (looked up in `PATH`) or path to the executable
    pub program: PathBuf,
    /// Leading arguments passed on every invocation
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Create a command with no leading arguments
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a leading argument
    #[must_use]
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `rembg i`, the removal tool in image mode
    pub fn rembg() -> Self {
        Self::new("rembg").arg("i")
    }

    /// `curl -sL`, the fetcher used for remote URLs
    pub fn curl() -> Self {
        Self::new("curl").arg("-sL")
    }

    /// Replace the program while keeping the leading arguments
    #[must_use]
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    /// Short name used in logs and error messages
    pub fn label(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Build a tokio command for this tool with `extra` appended
    pub(crate) fn command<I, S>(&self, extra: I) -> tokio::process::Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).args(extra);
        command
    }
}

/// Options shared by every job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalOptions {
    /// Deadline for the removal process, in milliseconds (must be positive)
    pub timeout_ms: u64,

    /// Optional deadline for the fetch stage of URL jobs (None = no deadline)
    pub fetch_timeout_ms: Option<u64>,

    /// Maximum number of jobs a `BackgroundRemover` runs at once (0 = unbounded)
    pub max_concurrent_jobs: usize,

    /// Background removal executable
    pub remover: ToolCommand,

    /// URL fetch executable
    pub fetcher: ToolCommand,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fetch_timeout_ms: None,
            max_concurrent_jobs: 0,
            remover: ToolCommand::rembg(),
            fetcher: ToolCommand::curl(),
        }
    }
}

impl RemovalOptions {
    /// Create a new options builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rembg_process::RemovalOptions;
    ///
    /// let options = RemovalOptions::builder()
    ///     .timeout_ms(5000)
    ///     .remover_program("/opt/rembg/bin/rembg")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(options.timeout().as_millis(), 5000);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalOptionsBuilder {
        RemovalOptionsBuilder::default()
    }

    /// Removal deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Fetch-stage deadline as a `Duration`, if one is configured
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Load options from a JSON file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RembgError::invalid_config(format!(
                "Failed to read options file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let options: Self = serde_json::from_str(&content).map_err(|e| {
            RembgError::invalid_config(format!(
                "Failed to parse options file '{}': {}",
                path.display(),
                e
            ))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Validate all option values
    ///
    /// # Errors
    /// - `timeout_ms` is zero
    /// - `fetch_timeout_ms` is `Some(0)`
    /// - either tool has an empty program
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(RembgError::invalid_config(
                "timeout must be a positive number of milliseconds",
            ));
        }

        if self.fetch_timeout_ms == Some(0) {
            return Err(RembgError::invalid_config(
                "fetch timeout must be a positive number of milliseconds",
            ));
        }

        for (role, tool) in [("remover", &self.remover), ("fetcher", &self.fetcher)] {
            if tool.program.as_os_str().is_empty() {
                return Err(RembgError::invalid_config(format!(
                    "{} program must not be empty",
                    role
                )));
            }
        }

        Ok(())
    }
}

/// Builder for `RemovalOptions`
#[derive(Debug, Default)]
pub struct RemovalOptionsBuilder {
    options: RemovalOptions,
}

impl RemovalOptionsBuilder {
    /// Start from existing options (e.g. loaded from a file)
    #[must_use]
    pub fn from_options(options: RemovalOptions) -> Self {
        Self { options }
    }

    /// Set the removal deadline in milliseconds
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = timeout_ms;
        self
    }

    /// Set the removal deadline
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set or clear the fetch-stage deadline in milliseconds
    #[must_use]
    pub fn fetch_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.options.fetch_timeout_ms = timeout_ms;
        self
    }

    /// Cap concurrent jobs (0 = unbounded)
    #[must_use]
    pub fn max_concurrent_jobs(mut self, limit: usize) -> Self {
        self.options.max_concurrent_jobs = limit;
        self
    }

    #[must_use]
    pub fn remover(mut self, tool: ToolCommand) -> Self {
        self.options.remover = tool;
        self
    }

    #[must_use]
    pub fn fetcher(mut self, tool: ToolCommand) -> Self {
        self.options.fetcher = tool;
        self
    }

    /// Point at a different removal executable, keeping its leading arguments
    #[must_use]
    pub fn remover_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.options.remover = self.options.remover.with_program(program);
        self
    }

    /// Point at a different fetch executable, keeping its leading arguments
    #[must_use]
    pub fn fetcher_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.options.fetcher = self.options.fetcher.with_program(program);
        self
    }

    /// Build and validate the options
    pub fn build(self) -> Result<RemovalOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RemovalOptions::default();
        assert_eq!(options.timeout(), Duration::from_millis(10_000));
        assert_eq!(options.fetch_timeout(), None);
        assert_eq!(options.max_concurrent_jobs, 0);
        assert_eq!(options.remover, ToolCommand::new("rembg").arg("i"));
        assert_eq!(options.fetcher, ToolCommand::new("curl").arg("-sL"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_timeouts() {
        let err = RemovalOptions::builder().timeout_ms(0).build().unwrap_err();
        assert!(err.to_string().contains("timeout"));

        let err = RemovalOptions::builder()
            .fetch_timeout_ms(Some(0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("fetch timeout"));
    }

    #[test]
    fn test_validation_rejects_empty_program() {
        let err = RemovalOptions::builder()
            .fetcher_program("")
            .build()
            .unwrap_err();
        assert!(matches!(err, RembgError::InvalidConfig(_)));
        assert!(err.to_string().contains("fetcher"));
    }

    #[test]
    fn test_program_override_keeps_leading_args() {
        let options = RemovalOptions::builder()
            .remover_program("/opt/venv/bin/rembg")
            .build()
            .unwrap();
        assert_eq!(options.remover.args, vec!["i".to_string()]);
        assert_eq!(options.remover.label(), "rembg");
    }

    #[test]
    fn test_partial_json_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{ "timeout_ms": 2500, "fetcher": { "program": "wget2" } }"#)
            .unwrap();

        let options = RemovalOptions::from_json_file(&path).unwrap();
        assert_eq!(options.timeout_ms, 2500);
        assert_eq!(options.fetcher.program, PathBuf::from("wget2"));
        assert!(options.fetcher.args.is_empty());
        assert_eq!(options.remover, ToolCommand::rembg());
    }

    #[test]
    fn test_invalid_json_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = RemovalOptions::from_json_file(&path).unwrap_err();
        assert!(matches!(err, RembgError::InvalidConfig(_)));
    }
}
