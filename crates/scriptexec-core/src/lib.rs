// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! scriptexec Core - Execution Domain
//!
//! This crate holds everything the execution pipeline knows about programs,
//! independent of how requests arrive:
//!
//! - dispatching work to a language engine selected by name
//! - evaluating test batches against a program
//! - normalizing formatter/linter rules configuration
//! - the "rules updated" events carried on the streams
//!
//! # Architecture
//!
//! ```text
//!   RulesUpdatedEvent / sync request
//!                │
//!                ▼
//!   ┌──────────────────────────┐      ┌────────────────────────┐
//!   │     ExecutionService     │─────▶│   TestBatchEvaluator   │
//!   │ parse/lint/format/run    │      │ precheck → run → diff  │
//!   └────────────┬─────────────┘      └───────────┬────────────┘
//!                │ runner_for(language)           │
//!                ▼                                ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │                     EngineRegistry                       │
//!   └──────────────────────────┬───────────────────────────────┘
//!                              ▼
//!               dyn ExecutionEngine (ProcessEngine, MockEngine)
//! ```
//!
//! # Test statuses
//!
//! | Status | Condition |
//! |--------|-----------|
//! | `PASS` | actual outputs equal expected outputs |
//! | `FAIL` | outputs produced, first divergence at `mismatchAt` |
//! | `ERROR` | structured engine failure, or the precheck failed |
//!
//! # Modules
//!
//! - [`diagnostic`]: Diagnostic shape shared by validation, linting and failures
//! - [`engine`]: The engine capability and its adapters
//! - [`error`]: Error types
//! - [`evaluator`]: Batch test evaluation
//! - [`events`]: Stream event payloads
//! - [`options`]: Rules configuration resolution
//! - [`registry`]: Engine lookup by language
//! - [`service`]: Execution service facade
//! - [`types`]: Request and response types

#![deny(missing_docs)]

/// Diagnostics produced by validation and linting.
pub mod diagnostic;

/// Language execution engines.
pub mod engine;

/// Error types for execution.
pub mod error;

/// Batch test evaluation.
pub mod evaluator;

/// Rules-updated events.
pub mod events;

/// Formatter and linter configuration resolution.
pub mod options;

/// Engine registry.
pub mod registry;

/// Execution service facade.
pub mod service;

/// Request and response types.
pub mod types;

pub use diagnostic::Diagnostic;
pub use engine::{ExecutionEngine, Program, RunOutput};
pub use error::{ExecError, Result};
pub use evaluator::{TestBatchEvaluator, evaluate_outputs};
pub use events::{EventKind, RulesUpdatedEvent};
pub use registry::EngineRegistry;
pub use service::ExecutionService;
