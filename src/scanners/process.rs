//! External tool invocation.
//!
//! Arguments are always passed as a discrete list, never through a shell.
//! The child is spawned with `kill_on_drop`, so when the timeout fires and
//! the output future is dropped, the process is killed with it.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::errors::ScanError;
use crate::scanners::ScannerSettings;

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 500;

/// Captured result of a finished tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Trimmed, bounded stderr for log and error messages.
    pub fn stderr_excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let text = text.trim();
        match text.char_indices().nth(STDERR_EXCERPT) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }

    /// Stdout of a report-on-stdout tool.
    ///
    /// Analyzers exit non-zero when they find problems, so the exit status
    /// only matters when nothing was printed.
    pub fn into_report(self, tool: &str) -> Result<Vec<u8>, ScanError> {
        if self.stdout.iter().all(u8::is_ascii_whitespace) && !self.status.success() {
            return Err(self.failure(tool));
        }
        Ok(self.stdout)
    }

    pub fn failure(&self, tool: &str) -> ScanError {
        ScanError::ToolFailed {
            tool: tool.to_string(),
            status: self.status.to_string(),
            stderr: self.stderr_excerpt(),
        }
    }
}

/// Builder for one tool invocation.
#[derive(Debug)]
pub struct ToolCommand {
    tool: String,
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    dir: PathBuf,
    timeout: Duration,
    stdout: Option<File>,
}

impl ToolCommand {
    /// Invoke `tool` through the configured runner prefix (e.g. `bundle exec rubocop`).
    pub fn tool(settings: &ScannerSettings, tool: &str, dir: &Path) -> Self {
        let (program, mut args): (OsString, Vec<OsString>) = match settings.runner.split_first() {
            Some((first, rest)) => (first.into(), rest.iter().map(OsString::from).collect()),
            None => (tool.into(), Vec::new()),
        };
        if !settings.runner.is_empty() {
            args.push(tool.into());
        }

        Self {
            tool: tool.to_string(),
            program,
            args,
            envs: Vec::new(),
            dir: dir.to_path_buf(),
            timeout: settings.tool_timeout,
            stdout: None,
        }
    }

    /// Invoke a program directly, bypassing the runner prefix.
    pub fn program(program: impl AsRef<OsStr>, dir: &Path, timeout: Duration) -> Self {
        let program = program.as_ref().to_os_string();
        Self {
            tool: program.to_string_lossy().into_owned(),
            program,
            args: Vec::new(),
            envs: Vec::new(),
            dir: dir.to_path_buf(),
            timeout,
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send stdout straight into `file` instead of capturing it.
    pub fn stdout_to(mut self, file: File) -> Self {
        self.stdout = Some(file);
        self
    }

    /// Run to completion under the configured timeout.
    ///
    /// Stdio is set explicitly and the child is awaited with
    /// `wait_with_output`, which keeps a file redirect in place.
    pub async fn output(self) -> Result<ToolOutput, ScanError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match self.stdout {
            Some(file) => cmd.stdout(Stdio::from(file)),
            None => cmd.stdout(Stdio::piped()),
        };

        tracing::debug!(
            tool = %self.tool,
            dir = %self.dir.display(),
            timeout_secs = self.timeout.as_secs(),
            "Running tool"
        );

        let child = cmd.spawn().map_err(|source| ScanError::Spawn {
            tool: self.tool.clone(),
            source,
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => Err(ScanError::Timeout {
                tool: self.tool,
                after: self.timeout,
            }),
            Ok(Err(source)) => Err(ScanError::Spawn {
                tool: self.tool,
                source,
            }),
            Ok(Ok(output)) => Ok(ToolOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
        }
    }
}
