// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Linting rules updated: re-lint the snippet and store the violations.

use async_trait::async_trait;
use scriptexec_core::types::LintRequest;
use scriptexec_core::{EventKind, RulesUpdatedEvent};
use tracing::{Instrument, debug, info, info_span};

use super::{EventHandler, HandlerContext, HandlerOutcome, log_failure};
use crate::error::Result;
use crate::stream::StreamRecord;

/// Handles events from the linting stream.
#[derive(Clone)]
pub struct LintingEventHandler {
    ctx: HandlerContext,
}

impl LintingEventHandler {
    /// Create a handler over `ctx`.
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    async fn process(&self, event: &RulesUpdatedEvent) -> Result<usize> {
        let config_format = event.resolved_config_format()?;
        let content = self.ctx.store.get_content(event.subject_id).await?;
        debug!(content_len = content.len(), "Fetched snippet content");

        // Lint events carry no formatter overrides.
        let request = LintRequest {
            program: event.program(content),
            config_text: event.config_text.clone(),
            config_format,
        };
        let response = self.ctx.service.lint(&request).await?;

        self.ctx
            .store
            .save_lint(event.subject_id, &response.violations)
            .await?;
        Ok(response.violations.len())
    }
}

#[async_trait]
impl EventHandler for LintingEventHandler {
    fn kind(&self) -> EventKind {
        EventKind::Linting
    }

    async fn on_message(&self, record: &StreamRecord) -> HandlerOutcome {
        let Some(event) = self.ctx.decode(EventKind::Linting, record) else {
            return HandlerOutcome::Dropped;
        };

        let span = info_span!(
            "lint_event",
            correlation_id = %event.effective_correlation_id(EventKind::Linting),
            subject_id = %event.subject_id,
            attempt = event.attempt,
        );

        async {
            match self.process(&event).await {
                Ok(violations) => {
                    info!(violations, "Snippet linted");
                    HandlerOutcome::Processed
                }
                Err(e) => {
                    log_failure(EventKind::Linting, &event, &e);
                    self.ctx.retry_or_dlq(EventKind::Linting, &event, &e).await
                }
            }
        }
        .instrument(span)
        .await
    }
}
