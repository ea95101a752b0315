// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! scriptexec Worker - Rules-Updated Stream Processing
//!
//! Consumes "rules updated" events from Redis Streams and re-processes the
//! referenced snippets:
//!
//! - formatting events: fetch content, format, store the formatted content
//! - linting events: fetch content, lint, store the violations
//!
//! Delivery is at-least-once. A failed event is requeued with its attempt
//! counter incremented; past the cap it goes to a dead-letter stream and the
//! content store is told the subject failed.
//!
//! # Architecture
//!
//! ```text
//!   snippets.formatting ──▶ StreamConsumer ──▶ FormattingEventHandler ─┐
//!   snippets.linting    ──▶ StreamConsumer ──▶ LintingEventHandler ────┤
//!                                 ▲                                    │
//!                       requeue (attempt+1)        ContentStore ◀──────┤
//!                                 │                ExecutionService ◀──┘
//!                                 └─────── retry_or_dlq ──▶ <stream>.dlq
//! ```
//!
//! # Modules
//!
//! - [`backoff`]: Reconnect backoff
//! - [`config`]: Environment configuration
//! - [`content_store`]: Content store client
//! - [`error`]: Error types
//! - [`handler`]: Per-topic event handlers and the retry policy
//! - [`runtime`]: Embeddable runtime
//! - [`stream`]: Stream backends and the consumer loop

#![deny(missing_docs)]

/// Exponential backoff.
pub mod backoff;

/// Configuration loaded from the environment.
pub mod config;

/// Content store client.
pub mod content_store;

/// Error types.
pub mod error;

/// Event handlers.
pub mod handler;

/// Embeddable runtime.
pub mod runtime;

/// Stream backends and consumer.
pub mod stream;

pub use config::Config;
pub use content_store::{ContentStore, HttpContentStore};
pub use error::{Result, WorkerError};
pub use handler::{EventHandler, HandlerContext, HandlerOutcome};
pub use runtime::WorkerRuntime;
pub use stream::{StreamBackend, StreamConsumer};
