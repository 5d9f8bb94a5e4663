//! **ExternalToolRunner**: spawn a command-line program and capture its output.
//!
//! The runner knows nothing about audio; callers label each command with the stage it
//! belongs to so failures say which step broke.

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tracing::{debug, warn};

/// A program invocation plus the stage label reported on failure.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub stage: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(stage: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            program: program.into(),
            args: Vec::new(),
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

    /// Value following `flag` in the argument list (e.g. the `-o` output path).
    pub fn arg_after(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|a| a.as_os_str())
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs external tools. Implement for tests or sandboxed execution.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run to completion and return captured stdout. Non-zero exit is `ToolExecution`
    /// carrying the captured stderr.
    async fn run(&self, command: &ToolCommand) -> PipelineResult<String>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> PipelineResult<String> {
        let started = Instant::now();
        debug!(target: "avatar::tools", stage = %command.stage, "running: {}", command);

        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PipelineError::ToolExecution {
                stage: command.stage.clone(),
                status: None,
                diagnostics: format!("failed to spawn {}: {}", command.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target: "avatar::tools",
                stage = %command.stage,
                status = ?output.status.code(),
                "command failed: {}",
                stderr
            );
            return Err(PipelineError::ToolExecution {
                stage: command.stage.clone(),
                status: output.status.code(),
                diagnostics: stderr,
            });
        }

        debug!(
            target: "avatar::tools",
            stage = %command.stage,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
