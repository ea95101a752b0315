// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution service facade.
//!
//! Resolves the engine for each request, normalizes rules configuration, and
//! delegates. Used by the stream handlers and by any synchronous caller.

use tracing::info;

use crate::engine::{Program, RunOutput};
use crate::error::Result;
use crate::evaluator::TestBatchEvaluator;
use crate::options::{resolve_formatter_config, resolve_lint_config};
use crate::registry::EngineRegistry;
use crate::types::{
    FormatRequest, FormatResponse, LintRequest, LintResponse, ParseResponse, RunRequest,
    RunSingleTestRequest, RunSingleTestResponse, RunTestsRequest, RunTestsResponse, TestCase,
};

/// Dispatches execution requests to the registered engines.
#[derive(Debug, Clone)]
pub struct ExecutionService {
    registry: EngineRegistry,
    evaluator: TestBatchEvaluator,
}

impl ExecutionService {
    /// Create a service over `registry`.
    pub fn new(registry: EngineRegistry) -> Self {
        let evaluator = TestBatchEvaluator::new(registry.clone());
        Self {
            registry,
            evaluator,
        }
    }

    /// The engine registry.
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Validate a program.
    pub async fn parse(&self, program: &Program) -> Result<ParseResponse> {
        info!(
            language = %program.language,
            version = %program.version,
            content_len = program.content.len(),
            "Parsing program"
        );
        let engine = self.registry.runner_for(&program.language)?;
        let diagnostics = engine.validate(program).await?;
        info!(diagnostics = diagnostics.len(), "Parse finished");
        Ok(ParseResponse {
            valid: diagnostics.is_empty(),
            diagnostics,
        })
    }

    /// Lint a program.
    pub async fn lint(&self, req: &LintRequest) -> Result<LintResponse> {
        info!(
            language = %req.program.language,
            version = %req.program.version,
            content_len = req.program.content.len(),
            has_config = req.config_text.as_deref().is_some_and(|t| !t.trim().is_empty()),
            "Linting program"
        );
        let engine = self.registry.runner_for(&req.program.language)?;
        let config = resolve_lint_config(req.config_text.as_deref(), req.config_format)?;
        let violations = engine.lint(&req.program, config.as_deref()).await?;
        info!(violations = violations.len(), "Lint finished");
        Ok(LintResponse { violations })
    }

    /// Format a program.
    pub async fn format(&self, req: &FormatRequest) -> Result<FormatResponse> {
        info!(
            language = %req.program.language,
            version = %req.program.version,
            content_len = req.program.content.len(),
            has_config = req.config_text.as_deref().is_some_and(|t| !t.trim().is_empty()),
            has_options = req.options.is_some(),
            "Formatting program"
        );
        let engine = self.registry.runner_for(&req.program.language)?;
        let config = resolve_formatter_config(
            req.config_text.as_deref(),
            req.config_format,
            req.options.as_ref(),
        )?;
        let formatted_content = engine.format(&req.program, config.as_deref()).await?;
        info!(formatted_len = formatted_content.len(), "Format finished");
        Ok(FormatResponse { formatted_content })
    }

    /// Run a program.
    pub async fn run(&self, req: &RunRequest) -> Result<RunOutput> {
        info!(
            language = %req.program.language,
            version = %req.program.version,
            content_len = req.program.content.len(),
            inputs = req.inputs.len(),
            "Running program"
        );
        let engine = self.registry.runner_for(&req.program.language)?;
        let output = engine.execute(&req.program, &req.inputs).await?;
        info!(outputs = output.outputs.len(), "Run finished");
        Ok(output)
    }

    /// Run a batch of test cases.
    pub async fn run_tests(&self, req: &RunTestsRequest) -> Result<RunTestsResponse> {
        self.evaluator
            .run_tests(&req.program, &req.test_cases, req.options.as_ref())
            .await
    }

    /// Run a single test case.
    pub async fn run_single_test(&self, req: RunSingleTestRequest) -> Result<RunSingleTestResponse> {
        let case = TestCase {
            inputs: req.inputs,
            expected_outputs: req.expected_outputs,
        };
        let result = self
            .evaluator
            .run_single_test(&req.program, case, req.options.as_ref())
            .await?;
        Ok(result.into())
    }
}
