// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-topic event handlers.
//!
//! A handler turns one delivered record into side effects:
//!
//! 1. Decode the payload; undecodable records are logged and dropped.
//! 2. Fetch content, run the engine, persist the result.
//! 3. On failure, requeue a copy with `attempt + 1` onto the source stream, or
//!    past the cap publish the event unchanged to the dead-letter stream and
//!    mark the subject as failed.
//!
//! Processing runs inside a span carrying the event's correlation id.

pub mod formatting;
pub mod linting;

use async_trait::async_trait;
use scriptexec_core::{EventKind, ExecutionService, RulesUpdatedEvent};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{DEFAULT_MAX_ATTEMPTS, StreamSettings};
use crate::content_store::{ContentStore, preview};
use crate::error::WorkerError;
use crate::stream::{StreamBackend, StreamRecord, sanitize_identifier};

pub use formatting::FormattingEventHandler;
pub use linting::LintingEventHandler;

/// Longest payload excerpt written to logs.
const PAYLOAD_PREVIEW: usize = 200;

/// What a handler did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Processed and persisted.
    Processed,
    /// Undecodable; dropped without retry.
    Dropped,
    /// Failed; a copy with this attempt number was requeued.
    Requeued {
        /// Attempt number of the requeued copy.
        attempt: u32,
    },
    /// Failed for the last time; sent to the dead-letter stream.
    DeadLettered,
    /// Failed, and the follow-up publish failed as well.
    Lost,
}

/// Handles records delivered from one stream.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Kind of events this handler processes.
    fn kind(&self) -> EventKind;

    /// Process one record. Never fails; failures are turned into requeues or
    /// dead-letter entries.
    async fn on_message(&self, record: &StreamRecord) -> HandlerOutcome;
}

/// Collaborators and retry policy shared by the handlers.
#[derive(Clone)]
pub struct HandlerContext {
    pub(crate) service: ExecutionService,
    pub(crate) store: Arc<dyn ContentStore>,
    backend: Arc<dyn StreamBackend>,
    source_stream: String,
    dlq_stream: String,
    max_attempts: u32,
}

impl HandlerContext {
    /// Create a context publishing requeues and dead letters through `backend`.
    pub fn new(
        service: ExecutionService,
        store: Arc<dyn ContentStore>,
        backend: Arc<dyn StreamBackend>,
        streams: &StreamSettings,
    ) -> Self {
        Self {
            service,
            store,
            backend,
            source_stream: sanitize_identifier(&streams.key),
            dlq_stream: sanitize_identifier(&streams.dlq_key),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the requeue cap.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Source stream that requeued events go back to.
    pub fn source_stream(&self) -> &str {
        &self.source_stream
    }

    /// Dead-letter stream.
    pub fn dlq_stream(&self) -> &str {
        &self.dlq_stream
    }

    /// Decode a record payload, logging and returning `None` on failure.
    pub fn decode(&self, kind: EventKind, record: &StreamRecord) -> Option<RulesUpdatedEvent> {
        let Some(payload) = record.payload.as_deref() else {
            error!(
                stream = %self.source_stream,
                record_id = %record.id,
                topic = %kind,
                "Record has no payload field, dropping"
            );
            return None;
        };
        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                error!(
                    stream = %self.source_stream,
                    record_id = %record.id,
                    topic = %kind,
                    error = %e,
                    payload = %preview(payload, PAYLOAD_PREVIEW),
                    "Failed to decode event, dropping"
                );
                None
            }
        }
    }

    /// Requeue `event` with the next attempt number, or dead-letter it once the
    /// cap is reached or the failure is permanent.
    pub async fn retry_or_dlq(
        &self,
        kind: EventKind,
        event: &RulesUpdatedEvent,
        failure: &WorkerError,
    ) -> HandlerOutcome {
        let next_attempt = event.attempt.saturating_add(1);

        if !failure.is_permanent() && next_attempt <= self.max_attempts {
            let next = event.with_next_attempt();
            return match self.publish(&self.source_stream, &next).await {
                Ok(id) => {
                    info!(
                        subject_id = %event.subject_id,
                        attempt = next.attempt,
                        record_id = %id,
                        "Retry scheduled"
                    );
                    HandlerOutcome::Requeued {
                        attempt: next.attempt,
                    }
                }
                Err(e) => {
                    error!(
                        subject_id = %event.subject_id,
                        attempt = next.attempt,
                        error = %e,
                        "Failed to requeue event"
                    );
                    HandlerOutcome::Lost
                }
            };
        }

        let outcome = match self.publish(&self.dlq_stream, event).await {
            Ok(id) => {
                error!(
                    dlq = %self.dlq_stream,
                    subject_id = %event.subject_id,
                    attempts = event.attempt,
                    permanent = failure.is_permanent(),
                    record_id = %id,
                    "Sent to DLQ"
                );
                HandlerOutcome::DeadLettered
            }
            Err(e) => {
                error!(
                    dlq = %self.dlq_stream,
                    subject_id = %event.subject_id,
                    error = %e,
                    "Failed to publish to DLQ"
                );
                HandlerOutcome::Lost
            }
        };

        if let Err(e) = self.store.mark_failed(event.subject_id, kind).await {
            warn!(
                subject_id = %event.subject_id,
                topic = %kind,
                error = %e,
                "Failed to notify content store of permanent failure"
            );
        }

        outcome
    }

    async fn publish(&self, stream: &str, event: &RulesUpdatedEvent) -> crate::stream::Result<String> {
        let payload = serde_json::to_string(event)?;
        self.backend.publish(stream, &payload).await
    }
}

/// Log a processing failure with the fields every handler reports.
pub(crate) fn log_failure(kind: EventKind, event: &RulesUpdatedEvent, failure: &WorkerError) {
    warn!(
        subject_id = %event.subject_id,
        topic = %kind,
        attempt = event.attempt,
        code = failure.error_code(),
        error = %failure,
        "Processing failed"
    );
}
