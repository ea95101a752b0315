// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resilient consumer-group reader.
//!
//! One consumer drives one [`EventHandler`] from one stream:
//!
//! ```text
//!   bootstrap ──▶ read (XREADGROUP >, blocking) ──▶ handler ──▶ ack
//!       ▲                 │ error
//!       └──── backoff ◀───┘
//! ```
//!
//! Bootstrap ensures the consumer group exists, creating the stream if needed.
//! Read errors are retried forever with exponential backoff, and the group is
//! re-ensured before the next read. Every delivered record is acked once its
//! handler returns, whatever the outcome.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::{Result, StreamBackend, StreamRecord, sanitize_identifier};
use crate::backoff::{Backoff, BackoffConfig};
use crate::config::StreamSettings;
use crate::handler::{EventHandler, HandlerOutcome};

/// Default block timeout of a read.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of records per read.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Consumer identity: `<HOSTNAME or scriptexec>:<pid>`.
pub fn consumer_identity() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "scriptexec".to_string());
    format!("{}:{}", host, std::process::id())
}

/// Stream, group and consumer name of a consumer. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupState {
    /// Sanitized stream key.
    pub stream_key: String,
    /// Sanitized group name.
    pub group_name: String,
    /// Consumer name within the group.
    pub consumer_identity: String,
}

impl ConsumerGroupState {
    /// Sanitize the configured names and attach this process's identity.
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            stream_key: sanitize_identifier(&settings.key),
            group_name: sanitize_identifier(&settings.group),
            consumer_identity: consumer_identity(),
        }
    }
}

/// Reads a stream through a consumer group and dispatches to a handler.
pub struct StreamConsumer {
    state: ConsumerGroupState,
    backend: Arc<dyn StreamBackend>,
    handler: Arc<dyn EventHandler>,
    poll_timeout: Duration,
    batch_size: usize,
    backoff: BackoffConfig,
    shutdown: Arc<Notify>,
}

impl StreamConsumer {
    /// Create a consumer for `settings`, reading through `backend`.
    pub fn new(
        settings: &StreamSettings,
        backend: Arc<dyn StreamBackend>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            state: ConsumerGroupState::new(settings),
            backend,
            handler,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            backoff: BackoffConfig::default(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Set the block timeout of each read.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the maximum records per read.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the reconnect backoff.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Names this consumer reads with.
    pub fn state(&self) -> &ConsumerGroupState {
        &self.state
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Ensure the consumer group exists.
    ///
    /// Safe to call any number of times and from concurrent processes. A
    /// failing existence check falls back to creating the group.
    pub async fn bootstrap(&self) -> Result<()> {
        let stream = &self.state.stream_key;
        let group = &self.state.group_name;

        info!(
            stream = %stream,
            group = %group,
            consumer = %self.state.consumer_identity,
            "Starting consumer"
        );

        let exists = match self.backend.group_exists(stream, group).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(
                    stream = %stream,
                    group = %group,
                    error = %e,
                    "Group check failed, falling back to create"
                );
                false
            }
        };

        if exists {
            info!(stream = %stream, group = %group, "Consumer group already exists");
            return Ok(());
        }

        info!(stream = %stream, group = %group, "Consumer group not found, creating");
        let created = self.backend.create_group(stream, group).await?;
        if !created {
            debug!(stream = %stream, group = %group, "Consumer group created concurrently");
        }
        Ok(())
    }

    async fn read_batch(&self) -> Result<Vec<StreamRecord>> {
        self.backend
            .read_group(
                &self.state.stream_key,
                &self.state.group_name,
                &self.state.consumer_identity,
                self.batch_size,
                self.poll_timeout,
            )
            .await
    }

    async fn dispatch(&self, record: StreamRecord) -> HandlerOutcome {
        info!(
            group = %self.state.group_name,
            stream = %self.state.stream_key,
            record_id = %record.id,
            "DELIVER"
        );

        let outcome = self.handler.on_message(&record).await;
        debug!(record_id = %record.id, ?outcome, "Handler returned");

        let ids = [record.id];
        if let Err(e) = self
            .backend
            .ack(&self.state.stream_key, &self.state.group_name, &ids)
            .await
        {
            warn!(record_id = %ids[0], error = %e, "Failed to ack record");
        }
        outcome
    }

    /// Read one batch and process every record in it.
    pub async fn poll_once(&self) -> Result<Vec<HandlerOutcome>> {
        let records = self.read_batch().await?;
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(self.dispatch(record).await);
        }
        Ok(outcomes)
    }

    /// Run the delivery loop until shutdown is signalled.
    ///
    /// A read already in flight when shutdown arrives is allowed to finish,
    /// which takes at most the poll timeout, and the records it returned are
    /// handled and acked before the loop exits. Records handed to this consumer
    /// are therefore never left pending.
    pub async fn run(self) {
        let mut backoff = Backoff::new(self.backoff);
        let mut needs_bootstrap = true;
        let mut stopping = false;

        info!(
            stream = %self.state.stream_key,
            group = %self.state.group_name,
            topic = %self.handler.kind(),
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "Stream consumer started"
        );

        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);

        let this = &self;
        loop {
            let bootstrap_first = needs_bootstrap;
            let step = async move {
                if bootstrap_first {
                    this.bootstrap().await?;
                }
                this.read_batch().await
            };
            tokio::pin!(step);

            let result = tokio::select! {
                _ = &mut shutdown, if !stopping => {
                    stopping = true;
                    debug!(stream = %self.state.stream_key, "Shutdown requested, finishing current read");
                    step.await
                }
                result = &mut step => result,
            };

            match result {
                Ok(records) => {
                    if needs_bootstrap {
                        info!(
                            stream = %self.state.stream_key,
                            group = %self.state.group_name,
                            consumer = %self.state.consumer_identity,
                            "SUBSCRIBED"
                        );
                    }
                    needs_bootstrap = false;
                    backoff.reset();
                    for record in records {
                        self.dispatch(record).await;
                    }
                    if stopping {
                        break;
                    }
                }
                Err(e) => {
                    needs_bootstrap = true;
                    let delay = backoff.next_delay();
                    error!(
                        stream = %self.state.stream_key,
                        group = %self.state.group_name,
                        code = e.error_code(),
                        error = %e,
                        attempt = backoff.attempt(),
                        retry_in_ms = delay.as_millis() as u64,
                        "STREAM ERROR"
                    );
                    if stopping {
                        break;
                    }
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(
            stream = %self.state.stream_key,
            group = %self.state.group_name,
            "Stream consumer shutting down"
        );
    }
}
