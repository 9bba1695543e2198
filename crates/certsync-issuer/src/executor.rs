//! Subprocess execution seam

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::IssuerError;

/// One fully-specified process launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, for scanning tool messages
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run to completion. A non-zero exit is not an error at this level.
    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, IssuerError>;
}

/// Runs the program directly via `tokio::process`, never through a shell
#[derive(Debug, Default, Clone)]
pub struct TokioCommandExecutor;

#[async_trait]
impl CommandExecutor for TokioCommandExecutor {
    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, IssuerError> {
        let operation = invocation
            .args
            .first()
            .cloned()
            .unwrap_or_else(|| invocation.program.clone());
        debug!(
            "Executing {} {} (timeout {}s)",
            invocation.program,
            operation,
            invocation.timeout.as_secs()
        );

        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the child
        let output = tokio::time::timeout(invocation.timeout, command.output())
            .await
            .map_err(|_| IssuerError::Timeout {
                operation: operation.clone(),
                seconds: invocation.timeout.as_secs(),
            })?
            .map_err(|e| IssuerError::Spawn {
                program: invocation.program.clone(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
