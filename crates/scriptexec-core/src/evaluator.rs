// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch test evaluation.
//!
//! Runs every test case of a batch against one program and classifies each
//! outcome:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `PASS` | Outputs equal the expected outputs (same length, element-wise) |
//! | `FAIL` | Outputs were produced but diverge at `mismatchAt` |
//! | `ERROR` | The program failed before producing outputs |
//!
//! The program is validated once up front. When validation reports anything,
//! no case is executed and every case is marked `ERROR` with the first
//! diagnostic.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::diagnostic::Diagnostic;
use crate::engine::{ExecutionEngine, Program};
use crate::error::{ExecError, Result};
use crate::registry::EngineRegistry;
use crate::types::{RunTestsResponse, TestCase, TestResult, TestStatus, TestSummary};

/// Compare actual outputs against expected ones.
///
/// Returns the status and, for `FAIL`, the first diverging index. When the
/// common prefix matches but lengths differ, the divergence is reported where
/// the shorter sequence ends.
pub fn evaluate_outputs(expected: &[String], actual: &[String]) -> (TestStatus, Option<usize>) {
    let n = expected.len().min(actual.len());
    if let Some(i) = (0..n).find(|&i| expected[i] != actual[i]) {
        return (TestStatus::Fail, Some(i));
    }
    if expected.len() == actual.len() {
        (TestStatus::Pass, None)
    } else {
        (TestStatus::Fail, Some(n))
    }
}

/// Runs test batches against programs through the engine registry.
#[derive(Debug, Clone)]
pub struct TestBatchEvaluator {
    registry: EngineRegistry,
}

impl TestBatchEvaluator {
    /// Create an evaluator over `registry`.
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    /// Run every case of `test_cases` against `program`.
    ///
    /// `options` are accepted for engine-specific tuning and are not
    /// interpreted here.
    pub async fn run_tests(
        &self,
        program: &Program,
        test_cases: &[TestCase],
        options: Option<&Value>,
    ) -> Result<RunTestsResponse> {
        info!(
            cases = test_cases.len(),
            language = %program.language,
            version = %program.version,
            has_options = options.is_some(),
            "Running test batch"
        );

        let engine = self.registry.runner_for(&program.language)?;

        if let Some(results) = precheck(engine.as_ref(), program, test_cases).await? {
            warn!(
                cases = results.len(),
                "Test batch aborted: program failed validation"
            );
            return Ok(RunTestsResponse {
                summary: TestSummary {
                    total: results.len(),
                    passed: 0,
                },
                results,
            });
        }

        let mut results = Vec::with_capacity(test_cases.len());
        for (index, case) in test_cases.iter().enumerate() {
            results.push(run_case(engine.as_ref(), program, index, case).await?);
        }

        let passed = results
            .iter()
            .filter(|r| r.status == TestStatus::Pass)
            .count();

        info!(
            total = results.len(),
            passed,
            failed_or_error = results.len() - passed,
            "Test batch completed"
        );

        Ok(RunTestsResponse {
            summary: TestSummary {
                total: results.len(),
                passed,
            },
            results,
        })
    }

    /// Run a single case; equivalent to a batch of one.
    pub async fn run_single_test(
        &self,
        program: &Program,
        case: TestCase,
        options: Option<&Value>,
    ) -> Result<TestResult> {
        let response = self
            .run_tests(program, std::slice::from_ref(&case), options)
            .await?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ExecError::Engine("test batch of one returned no result".to_string()))
    }
}

/// Validate once; on any diagnostic, build an `ERROR` result for every case.
async fn precheck(
    engine: &dyn ExecutionEngine,
    program: &Program,
    test_cases: &[TestCase],
) -> Result<Option<Vec<TestResult>>> {
    let diagnostics = engine.validate(program).await?;
    let Some(first) = diagnostics.into_iter().next() else {
        return Ok(None);
    };

    debug!(diagnostic = %first, "Precheck failed");

    let results = (0..test_cases.len())
        .map(|index| error_result(index, first.message.clone(), Some(first.clone())))
        .collect();
    Ok(Some(results))
}

async fn run_case(
    engine: &dyn ExecutionEngine,
    program: &Program,
    index: usize,
    case: &TestCase,
) -> Result<TestResult> {
    match engine.execute(program, &case.inputs).await {
        Ok(run) => {
            let (status, mismatch_at) = evaluate_outputs(&case.expected_outputs, &run.outputs);
            debug!(index, ?status, ?mismatch_at, "Test case evaluated");
            Ok(TestResult {
                index,
                status,
                expected: Some(case.expected_outputs.clone()),
                actual: Some(run.outputs),
                mismatch_at,
                reason: None,
                diagnostic: None,
            })
        }
        Err(ExecError::ExecutionFailed {
            message,
            diagnostic,
        }) => {
            debug!(index, reason = %message, "Test case errored");
            Ok(error_result(index, message, diagnostic))
        }
        Err(other) => Err(other),
    }
}

fn error_result(index: usize, reason: String, diagnostic: Option<Diagnostic>) -> TestResult {
    TestResult {
        index,
        status: TestStatus::Error,
        expected: None,
        actual: None,
        mismatch_at: None,
        reason: Some(reason),
        diagnostic,
    }
}
