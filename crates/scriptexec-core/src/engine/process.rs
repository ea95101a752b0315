// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine adapter that runs a language toolchain as a child process.
//!
//! Each operation spawns `<command> [args..] <operation>`, writes a JSON request
//! to stdin and reads a JSON reply from stdout:
//!
//! ```text
//! stdin:  {"language":"printscript","version":"1.1","content":"...","config":"{...}","inputs":["..."]}
//! stdout: {"status":"ok","diagnostics":[...],"formatted":"...","outputs":[...]}
//!     or: {"status":"error","message":"...","diagnostic":{...}}
//! ```
//!
//! The child is killed when the configured timeout elapses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExecutionEngine, Program, RunOutput};
use crate::diagnostic::Diagnostic;
use crate::error::{ExecError, Result};

/// Default per-invocation timeout.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    language: &'a str,
    version: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs: Option<&'a [String]>,
}

impl<'a> EngineRequest<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            language: &program.language,
            version: &program.version,
            content: &program.content,
            config: None,
            inputs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum EngineReply {
    Ok {
        #[serde(default)]
        diagnostics: Vec<Diagnostic>,
        #[serde(default)]
        formatted: Option<String>,
        #[serde(default)]
        outputs: Vec<String>,
    },
    Error {
        message: String,
        #[serde(default)]
        diagnostic: Option<Diagnostic>,
    },
}

/// Execution engine backed by an external toolchain binary.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    language: String,
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessEngine {
    /// Create an engine for `language` that runs `command`.
    pub fn new(language: impl Into<String>, command: impl Into<PathBuf>) -> Self {
        Self {
            language: language.into(),
            command: command.into(),
            args: Vec::new(),
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    /// Arguments placed before the operation name.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn invoke(&self, operation: &str, request: &EngineRequest<'_>) -> Result<EngineReply> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ExecError::Engine(format!("failed to encode request: {}", e)))?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(operation)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecError::Engine(format!(
                    "failed to spawn '{}': {}",
                    self.command.display(),
                    e
                ))
            })?;

        // The request is written while the output is drained, and both sit under
        // the timeout. Dropping the exchange on timeout drops the child, which kills it.
        let stdin = child.stdin.take();
        let write_request = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let exchange = async {
            let (written, output) = tokio::join!(write_request, child.wait_with_output());
            if let Err(e) = written {
                debug!(
                    language = %self.language,
                    operation,
                    error = %e,
                    "Engine did not read the whole request"
                );
            }
            output
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                warn!(
                    language = %self.language,
                    operation,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Engine invocation timed out"
                );
                ExecError::Engine(format!(
                    "{} timed out after {:?}",
                    operation, self.timeout
                ))
            })?
            .map_err(|e| ExecError::Engine(format!("failed to wait for engine: {}", e)))?;

        debug!(
            language = %self.language,
            operation,
            exit_code = ?output.status.code(),
            stdout_len = output.stdout.len(),
            "Engine invocation finished"
        );

        match serde_json::from_slice::<EngineReply>(&output.stdout) {
            Ok(reply) => Ok(reply),
            Err(_) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExecError::Engine(format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                )))
            }
            Err(e) => Err(ExecError::Engine(format!("unreadable engine reply: {}", e))),
        }
    }

    async fn call(&self, operation: &str, request: &EngineRequest<'_>) -> Result<OkReply> {
        match self.invoke(operation, request).await? {
            EngineReply::Ok {
                diagnostics,
                formatted,
                outputs,
            } => Ok(OkReply {
                diagnostics,
                formatted,
                outputs,
            }),
            EngineReply::Error {
                message,
                diagnostic,
            } => Err(ExecError::ExecutionFailed {
                message,
                diagnostic,
            }),
        }
    }
}

struct OkReply {
    diagnostics: Vec<Diagnostic>,
    formatted: Option<String>,
    outputs: Vec<String>,
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    fn language(&self) -> &str {
        &self.language
    }

    async fn validate(&self, program: &Program) -> Result<Vec<Diagnostic>> {
        let request = EngineRequest::new(program);
        Ok(self.call("validate", &request).await?.diagnostics)
    }

    async fn lint(&self, program: &Program, config: Option<&str>) -> Result<Vec<Diagnostic>> {
        let request = EngineRequest {
            config,
            ..EngineRequest::new(program)
        };
        Ok(self.call("lint", &request).await?.diagnostics)
    }

    async fn format(&self, program: &Program, config: Option<&str>) -> Result<String> {
        let request = EngineRequest {
            config,
            ..EngineRequest::new(program)
        };
        self.call("format", &request)
            .await?
            .formatted
            .ok_or_else(|| ExecError::Engine("format reply has no 'formatted' field".to_string()))
    }

    async fn execute(&self, program: &Program, inputs: &[String]) -> Result<RunOutput> {
        let request = EngineRequest {
            inputs: Some(inputs),
            ..EngineRequest::new(program)
        };
        let reply = self.call("execute", &request).await?;
        Ok(RunOutput {
            outputs: reply.outputs,
        })
    }
}
