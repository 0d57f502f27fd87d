// SPDX-License-Identifier: MIT

//! Sandboxed code execution for `kind: code` nodes.
//!
//! The default [`ProcessSandbox`] runs the node's code in a child
//! interpreter process. Inputs are passed as a JSON object on stdin; the
//! code must print its result object as the last line of stdout. A wall
//! clock limit is always enforced.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::SandboxError;

/// Execution limits for one sandbox invocation.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub wall_clock_secs: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self { wall_clock_secs: 30 }
    }
}

/// Everything a sandbox run produced.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    /// Parsed JSON result object from the last stdout line.
    pub result: Value,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        inputs: &Map<String, Value>,
        limits: ResourceLimits,
    ) -> Result<SandboxOutcome, SandboxError>;
}

/// Child-process sandbox using a configurable interpreter.
pub struct ProcessSandbox {
    interpreter: String,
}

impl ProcessSandbox {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(
        &self,
        code: &str,
        inputs: &Map<String, Value>,
        limits: ResourceLimits,
    ) -> Result<SandboxOutcome, SandboxError> {
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(code)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = Value::Object(inputs.clone()).to_string();
            // A closed stdin just means the code never reads inputs.
            let _ = stdin.write_all(payload.as_bytes()).await;
        }

        let waited = tokio::time::timeout(
            std::time::Duration::from_secs(limits.wall_clock_secs),
            child.wait_with_output(),
        )
        .await;

        let output = match waited {
            Ok(result) => result.map_err(|source| SandboxError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })?,
            Err(_) => {
                return Err(SandboxError::Timeout {
                    seconds: limits.wall_clock_secs,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(SandboxError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let last_line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| SandboxError::InvalidResult {
                detail: "stdout is empty".to_string(),
            })?;

        let result: Value =
            serde_json::from_str(last_line).map_err(|err| SandboxError::InvalidResult {
                detail: format!("last stdout line is not JSON: {}", err),
            })?;

        Ok(SandboxOutcome {
            result,
            stdout,
            stderr,
        })
    }
}
