// SPDX-License-Identifier: GPL-3.0-only

//! External command execution with a hard deadline
//!
//! `diskutil` talks to diskarbitrationd and can hang indefinitely when disk
//! access entitlements are missing or a permission prompt is pending, so
//! every invocation runs under a timeout and the child is killed on expiry.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SysError};

/// Default deadline for a single external command
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(6);

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// The stderr text when the command reported anything on stderr.
    ///
    /// diskutil signals failure through stderr rather than its exit status
    /// in several cases, so callers treat any stderr output as a failure.
    pub fn failure(&self) -> Option<&str> {
        if self.stderr.is_empty() {
            None
        } else {
            Some(&self.stderr)
        }
    }
}

/// Seam for process execution, so the engine can be driven by fakes in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], stdin: Option<&[u8]>)
    -> Result<CommandOutput>;
}

/// Real process execution through tokio
#[derive(Debug, Clone)]
pub struct SystemShell {
    timeout: Duration,
}

impl SystemShell {
    pub fn new() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SystemShell {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput> {
        debug!(program, ?args, "running external command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = command.spawn()?;

        if let Some(bytes) = stdin {
            // Write the payload and close the pipe so the child sees EOF.
            let mut pipe = child.stdin.take().ok_or_else(|| {
                SysError::OperationFailed(format!("stdin pipe unavailable for {program}"))
            })?;
            pipe.write_all(bytes).await?;
            drop(pipe);
        }

        let collected = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match collected {
            Ok(output) => {
                let output = output?;
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
            Err(_elapsed) => Err(SysError::Timeout {
                command: program.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
