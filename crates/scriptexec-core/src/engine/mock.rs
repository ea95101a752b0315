// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock engine for testing.
//!
//! A scriptable engine that records every call it receives and answers with
//! canned diagnostics, formatted text, or outputs computed from the inputs.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ExecutionEngine, Program, RunOutput};
use crate::diagnostic::Diagnostic;
use crate::error::{ExecError, Result};

type RunFn = dyn Fn(&[String]) -> Result<Vec<String>> + Send + Sync;

/// A call recorded by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `validate` was called.
    Validate,
    /// `lint` was called with this config.
    Lint {
        /// Config passed by the caller.
        config: Option<String>,
    },
    /// `format` was called with this config.
    Format {
        /// Config passed by the caller.
        config: Option<String>,
    },
    /// `execute` was called with these inputs.
    Execute {
        /// Inputs passed by the caller.
        inputs: Vec<String>,
    },
}

/// Mock engine for testing.
pub struct MockEngine {
    language: String,
    validation: Vec<Diagnostic>,
    violations: Vec<Diagnostic>,
    formatted: Option<String>,
    run: Arc<RunFn>,
    failure: Option<ExecError>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockEngine {
    /// Create a mock engine for `language` that echoes inputs as outputs,
    /// validates everything, reports no lint violations, and formats by trimming.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            validation: Vec::new(),
            violations: Vec::new(),
            formatted: None,
            run: Arc::new(|inputs: &[String]| Ok(inputs.to_vec())),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Report these diagnostics from `validate`.
    pub fn with_validation_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.validation = diagnostics;
        self
    }

    /// Report these diagnostics from `lint`.
    pub fn with_lint_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.violations = diagnostics;
        self
    }

    /// Return this text from `format`.
    pub fn with_formatted(mut self, formatted: impl Into<String>) -> Self {
        self.formatted = Some(formatted.into());
        self
    }

    /// Compute `execute` outputs with `run`.
    pub fn with_runner<F>(mut self, run: F) -> Self
    where
        F: Fn(&[String]) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.run = Arc::new(run);
        self
    }

    /// Fail `lint`, `format`, and `execute` with `error`.
    pub fn failing_with(mut self, error: ExecError) -> Self {
        self.failure = Some(error);
        self
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock_calls().clone()
    }

    /// Number of `execute` calls received so far.
    pub fn execute_count(&self) -> usize {
        self.lock_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Execute { .. }))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.lock_calls().push(call);
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail_if_configured(&self) -> Result<()> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    fn language(&self) -> &str {
        &self.language
    }

    async fn validate(&self, _program: &Program) -> Result<Vec<Diagnostic>> {
        self.record(MockCall::Validate);
        Ok(self.validation.clone())
    }

    async fn lint(&self, _program: &Program, config: Option<&str>) -> Result<Vec<Diagnostic>> {
        self.record(MockCall::Lint {
            config: config.map(str::to_string),
        });
        self.fail_if_configured()?;
        Ok(self.violations.clone())
    }

    async fn format(&self, program: &Program, config: Option<&str>) -> Result<String> {
        self.record(MockCall::Format {
            config: config.map(str::to_string),
        });
        self.fail_if_configured()?;
        Ok(self
            .formatted
            .clone()
            .unwrap_or_else(|| program.content.trim().to_string()))
    }

    async fn execute(&self, _program: &Program, inputs: &[String]) -> Result<RunOutput> {
        self.record(MockCall::Execute {
            inputs: inputs.to_vec(),
        });
        self.fail_if_configured()?;
        let outputs = (self.run)(inputs)?;
        Ok(RunOutput { outputs })
    }
}
