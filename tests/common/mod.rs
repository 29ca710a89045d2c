//! Shared helpers for integration tests
//!
//! Stub shell scripts stand in for `rembg` and `curl`. They are run through
//! `sh <script>` so no executable bit is needed.

#![allow(dead_code)]

use rembg_process::{RemovalOptions, ToolCommand};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Scratch directory holding stub scripts, inputs and outputs for one test
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` and return its path
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.file(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    /// Write a stub script and return a tool that runs it with `sh`
    ///
    /// Single-process stubs see `$1` = input and `$2` = output; fetch stubs
    /// see `$1` = URL; pipeline removers get no arguments.
    pub fn stub(&self, name: &str, body: &str) -> ToolCommand {
        let script = self.write(&format!("{}.sh", name), format!("#!/bin/sh\n{}\n", body));
        ToolCommand::new("sh").arg(script.to_string_lossy())
    }

    /// Stub that records its pid in `<name>.pid` and then sleeps
    pub fn sleeper(&self, name: &str, seconds: u32) -> (ToolCommand, PathBuf) {
        let pid_file = self.file(&format!("{}.pid", name));
        let tool = self.stub(
            name,
            &format!("echo $$ > '{}'\nexec sleep {}", pid_file.display(), seconds),
        );
        (tool, pid_file)
    }
}

pub fn options(remover: ToolCommand, fetcher: ToolCommand, timeout_ms: u64) -> RemovalOptions {
    RemovalOptions::builder()
        .remover(remover)
        .fetcher(fetcher)
        .timeout_ms(timeout_ms)
        .build()
        .expect("valid options")
}

pub fn read_pid(pid_file: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_file).ok()?.trim().parse().ok()
}

pub fn is_running(pid: u32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Assert the process recorded in `pid_file` (if it got that far) is gone
pub fn assert_not_running(pid_file: &Path) {
    if let Some(pid) = read_pid(pid_file) {
        assert!(!is_running(pid), "process {} is still running", pid);
    }
}
