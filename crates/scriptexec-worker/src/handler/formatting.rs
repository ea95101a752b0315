// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formatting rules updated: re-format the snippet and store the result.

use async_trait::async_trait;
use scriptexec_core::types::FormatRequest;
use scriptexec_core::{EventKind, RulesUpdatedEvent};
use tracing::{Instrument, debug, info, info_span};

use super::{EventHandler, HandlerContext, HandlerOutcome, log_failure};
use crate::error::Result;
use crate::stream::StreamRecord;

/// Handles events from the formatting stream.
#[derive(Clone)]
pub struct FormattingEventHandler {
    ctx: HandlerContext,
}

impl FormattingEventHandler {
    /// Create a handler over `ctx`.
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    async fn process(&self, event: &RulesUpdatedEvent) -> Result<()> {
        let config_format = event.resolved_config_format()?;
        let content = self.ctx.store.get_content(event.subject_id).await?;
        debug!(content_len = content.len(), "Fetched snippet content");

        let request = FormatRequest {
            program: event.program(content),
            config_text: event.config_text.clone(),
            config_format,
            options: event.options.clone(),
        };
        let response = self.ctx.service.format(&request).await?;

        self.ctx
            .store
            .save_formatted(event.subject_id, &response.formatted_content)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for FormattingEventHandler {
    fn kind(&self) -> EventKind {
        EventKind::Formatting
    }

    async fn on_message(&self, record: &StreamRecord) -> HandlerOutcome {
        let Some(event) = self.ctx.decode(EventKind::Formatting, record) else {
            return HandlerOutcome::Dropped;
        };

        let span = info_span!(
            "format_event",
            correlation_id = %event.effective_correlation_id(EventKind::Formatting),
            subject_id = %event.subject_id,
            attempt = event.attempt,
        );

        async {
            match self.process(&event).await {
                Ok(()) => {
                    info!("Snippet formatted");
                    HandlerOutcome::Processed
                }
                Err(e) => {
                    log_failure(EventKind::Formatting, &event, &e);
                    self.ctx
                        .retry_or_dlq(EventKind::Formatting, &event, &e)
                        .await
                }
            }
        }
        .instrument(span)
        .await
    }
}
