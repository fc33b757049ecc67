//! External command execution
//!
//! Every container-engine and Ansible invocation goes through [`CommandRunner`],
//! so the deploy flow can be driven against a recording runner in tests.

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// A fully-specified external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            capture: false,
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Human-readable command line (for logs only, not shell-safe)
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push_str(&format!("{:?}", arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Empty unless the command was captured
    pub stdout: String,
    /// Empty unless the command was captured
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }
}

/// Runs external commands to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and wait for it to exit
    ///
    /// A non-zero exit is not an error here; only failing to launch is.
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Runner backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(ref cwd) = command.cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!("Running: {}", command.display());

        let spawn_error = |source| DeployError::Spawn {
            program: command.program.clone(),
            source,
        };

        if command.capture {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            let output = cmd.output().await.map_err(spawn_error)?;
            Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        } else {
            let status = cmd.status().await.map_err(spawn_error)?;
            Ok(CommandOutput {
                code: status.code(),
                ..Default::default()
            })
        }
    }
}
