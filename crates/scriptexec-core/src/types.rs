// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response types of the execution service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostic::Diagnostic;
use crate::engine::Program;
use crate::options::{ConfigFormat, FormatterOptions};

// ============================================================================
// Requests
// ============================================================================

/// Lint a program with an optional rules document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintRequest {
    /// Program to lint.
    #[serde(flatten)]
    pub program: Program,
    /// Rules document.
    #[serde(default)]
    pub config_text: Option<String>,
    /// Format of `config_text`.
    #[serde(default)]
    pub config_format: Option<ConfigFormat>,
}

/// Format a program with an optional rules document and overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRequest {
    /// Program to format.
    #[serde(flatten)]
    pub program: Program,
    /// Rules document.
    #[serde(default)]
    pub config_text: Option<String>,
    /// Format of `config_text`.
    #[serde(default)]
    pub config_format: Option<ConfigFormat>,
    /// Typed overrides applied on top of `config_text`.
    #[serde(default)]
    pub options: Option<FormatterOptions>,
}

/// Run a program with the given inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Program to run.
    #[serde(flatten)]
    pub program: Program,
    /// Values returned by the program's input reads, in order.
    #[serde(default)]
    pub inputs: Vec<String>,
}

/// A single test case: inputs fed to the program and the outputs expected back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Inputs, in order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Expected printed lines, in order.
    #[serde(default)]
    pub expected_outputs: Vec<String>,
}

impl TestCase {
    /// Create a test case.
    pub fn new<I, O>(inputs: I, expected_outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            expected_outputs: expected_outputs.into_iter().map(Into::into).collect(),
        }
    }
}

/// Run a batch of test cases against one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestsRequest {
    /// Program under test.
    #[serde(flatten)]
    pub program: Program,
    /// Cases to run, in order.
    pub test_cases: Vec<TestCase>,
    /// Engine-specific run options, passed through untouched.
    #[serde(default)]
    pub options: Option<Value>,
}

/// Run one test case against a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSingleTestRequest {
    /// Program under test.
    #[serde(flatten)]
    pub program: Program,
    /// Inputs, in order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Expected printed lines, in order.
    #[serde(default)]
    pub expected_outputs: Vec<String>,
    /// Engine-specific run options, passed through untouched.
    #[serde(default)]
    pub options: Option<Value>,
}

// ============================================================================
// Responses
// ============================================================================

/// Result of validating a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResponse {
    /// Whether no diagnostic was reported.
    pub valid: bool,
    /// Diagnostics reported by the engine.
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of linting a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResponse {
    /// Rule violations.
    pub violations: Vec<Diagnostic>,
}

/// Result of formatting a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResponse {
    /// Formatted source text.
    pub formatted_content: String,
}

/// Outcome class of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    /// Outputs matched exactly.
    Pass,
    /// Outputs were produced but differ from the expected ones.
    Fail,
    /// The program failed before producing outputs.
    Error,
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Position of the case in the batch.
    pub index: usize,
    /// Outcome class.
    pub status: TestStatus,
    /// Expected outputs (PASS/FAIL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Vec<String>>,
    /// Actual outputs (PASS/FAIL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Vec<String>>,
    /// First diverging output index (FAIL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch_at: Option<usize>,
    /// Failure message (ERROR only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Failure position (ERROR only, when reported).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

/// Aggregate counts of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Number of cases run.
    pub total: usize,
    /// Number of cases with status PASS.
    pub passed: usize,
}

/// Result of a test batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTestsResponse {
    /// Aggregate counts.
    pub summary: TestSummary,
    /// Per-case results, in input order.
    pub results: Vec<TestResult>,
}

/// Result of a single test case run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSingleTestResponse {
    /// Outcome class.
    pub status: TestStatus,
    /// Actual outputs, when produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Vec<String>>,
    /// First diverging output index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch_at: Option<usize>,
    /// Failure position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl From<TestResult> for RunSingleTestResponse {
    fn from(result: TestResult) -> Self {
        Self {
            status: result.status,
            actual: result.actual,
            mismatch_at: result.mismatch_at,
            diagnostic: result.diagnostic,
        }
    }
}
