//! External tool capability.
//!
//! git, the package manager, and the Storybook CLI are all driven through
//! [`ToolRunner`]. The daemon uses [`SystemRunner`]; tests script the output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::CoreError;

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout. Handy for scripted runners.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turns an unsuccessful exit into [`CoreError::ToolFailed`].
    pub fn check(self, command: &ToolCommand) -> Result<ToolOutput, CoreError> {
        if self.success {
            return Ok(self);
        }
        let status = match self.code {
            Some(code) => format!("status {code}"),
            None => "a signal".to_string(),
        };
        let stderr = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        Err(CoreError::ToolFailed {
            command: command.to_string(),
            status,
            stderr,
        })
    }
}

/// Runs external programs to completion. There is no timeout: a hung program
/// blocks the caller.
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, CoreError>;

    /// Runs `command` and fails unless it exits successfully.
    fn run_checked(&self, command: &ToolCommand) -> Result<ToolOutput, CoreError> {
        self.run(command)?.check(command)
    }
}

/// [`ToolRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, CoreError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).current_dir(&command.cwd);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        let output = cmd.output().map_err(|source| CoreError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
