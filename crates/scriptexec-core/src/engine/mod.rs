// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution engine capability.
//!
//! An engine validates, lints, formats, and interprets programs written in one
//! language. The service never looks inside an engine; it only dispatches to
//! one through [`ExecutionEngine`].

pub mod mock;
pub mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::error::Result;

pub use mock::MockEngine;
pub use process::ProcessEngine;

/// A program submitted to an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Language identifier (e.g. `printscript`).
    pub language: String,
    /// Language version (e.g. `1.1`).
    pub version: String,
    /// Source text.
    pub content: String,
}

impl Program {
    /// Create a new program.
    pub fn new(
        language: impl Into<String>,
        version: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            version: version.into(),
            content: content.into(),
        }
    }
}

/// Outputs printed by a program run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Printed lines, in order.
    pub outputs: Vec<String>,
}

/// Language execution capability.
///
/// Engine-level failures must be reported as [`crate::ExecError::ExecutionFailed`]
/// with a diagnostic whenever the failure is caused by the input program.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Language name this engine handles. Registry lookups are case-insensitive.
    fn language(&self) -> &str;

    /// Parse and validate a program, returning syntax/semantic diagnostics.
    async fn validate(&self, program: &Program) -> Result<Vec<Diagnostic>>;

    /// Run static analysis with an optional JSON rules document.
    async fn lint(&self, program: &Program, config: Option<&str>) -> Result<Vec<Diagnostic>>;

    /// Format a program with an optional JSON rules document.
    async fn format(&self, program: &Program, config: Option<&str>) -> Result<String>;

    /// Interpret a program, feeding `inputs` to its input reads in order.
    async fn execute(&self, program: &Program, inputs: &[String]) -> Result<RunOutput>;
}
