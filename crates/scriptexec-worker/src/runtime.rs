// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for scriptexec-worker.
//!
//! [`WorkerRuntime`] wires one [`StreamConsumer`] per enabled event kind and
//! runs each on its own task with its own backend connection.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scriptexec_worker::runtime::WorkerRuntime;
//! use scriptexec_worker::stream::RedisBackendFactory;
//!
//! let runtime = WorkerRuntime::builder()
//!     .service(service)
//!     .content_store(Arc::new(store))
//!     .backends(Arc::new(RedisBackendFactory::new("redis://127.0.0.1:6379", poll_timeout)?))
//!     .formatting(config.formatting.clone())
//!     .linting(config.linting.clone())
//!     .build()?
//!     .start()
//!     .await?;
//!
//! // ... run until shutdown ...
//!
//! runtime.shutdown().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use scriptexec_core::{EventKind, ExecutionService};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::backoff::BackoffConfig;
use crate::config::{DEFAULT_MAX_ATTEMPTS, StreamSettings};
use crate::content_store::ContentStore;
use crate::handler::{EventHandler, FormattingEventHandler, HandlerContext, LintingEventHandler};
use crate::stream::consumer::{DEFAULT_BATCH_SIZE, DEFAULT_POLL_TIMEOUT};
use crate::stream::{StreamBackendFactory, StreamConsumer};

/// Builder for creating a [`WorkerRuntime`].
pub struct WorkerRuntimeBuilder {
    service: Option<ExecutionService>,
    content_store: Option<Arc<dyn ContentStore>>,
    backends: Option<Arc<dyn StreamBackendFactory>>,
    formatting: Option<StreamSettings>,
    linting: Option<StreamSettings>,
    max_attempts: u32,
    poll_timeout: Duration,
    batch_size: usize,
    backoff: BackoffConfig,
}

impl Default for WorkerRuntimeBuilder {
    fn default() -> Self {
        Self {
            service: None,
            content_store: None,
            backends: None,
            formatting: None,
            linting: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            backoff: BackoffConfig::default(),
        }
    }
}

impl WorkerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution service (required).
    pub fn service(mut self, service: ExecutionService) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the content store (required).
    pub fn content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.content_store = Some(store);
        self
    }

    /// Set the stream backend factory (required). Each consumer gets its own backend.
    pub fn backends(mut self, factory: Arc<dyn StreamBackendFactory>) -> Self {
        self.backends = Some(factory);
        self
    }

    /// Consume the formatting stream.
    pub fn formatting(mut self, settings: StreamSettings) -> Self {
        self.formatting = Some(settings);
        self
    }

    /// Consume the linting stream.
    pub fn linting(mut self, settings: StreamSettings) -> Self {
        self.linting = Some(settings);
        self
    }

    /// Set the requeue cap.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the read block timeout.
    ///
    /// Default: 3 seconds
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the maximum records per read.
    ///
    /// Default: 10
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the reconnect backoff.
    ///
    /// Default: 1 second initial, 30 seconds max, 0.2 jitter
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<WorkerRuntimeConfig> {
        let service = self
            .service
            .ok_or_else(|| anyhow::anyhow!("service is required"))?;
        let content_store = self
            .content_store
            .ok_or_else(|| anyhow::anyhow!("content_store is required"))?;
        let backends = self
            .backends
            .ok_or_else(|| anyhow::anyhow!("backends is required"))?;

        Ok(WorkerRuntimeConfig {
            service,
            content_store,
            backends,
            formatting: self.formatting,
            linting: self.linting,
            max_attempts: self.max_attempts,
            poll_timeout: self.poll_timeout,
            batch_size: self.batch_size,
            backoff: self.backoff,
        })
    }
}

/// Configuration for a [`WorkerRuntime`].
pub struct WorkerRuntimeConfig {
    service: ExecutionService,
    content_store: Arc<dyn ContentStore>,
    backends: Arc<dyn StreamBackendFactory>,
    formatting: Option<StreamSettings>,
    linting: Option<StreamSettings>,
    max_attempts: u32,
    poll_timeout: Duration,
    batch_size: usize,
    backoff: BackoffConfig,
}

impl WorkerRuntimeConfig {
    /// Start the runtime: connect, bootstrap each consumer group, and spawn
    /// one consumer task per configured stream.
    pub async fn start(self) -> Result<WorkerRuntime> {
        let mut consumers = Vec::new();

        if let Some(settings) = &self.formatting {
            let consumer = self
                .consumer(settings, |ctx| {
                    Arc::new(FormattingEventHandler::new(ctx)) as Arc<dyn EventHandler>
                })
                .await?;
            consumers.push(spawn(EventKind::Formatting, consumer));
        }

        if let Some(settings) = &self.linting {
            let consumer = self
                .consumer(settings, |ctx| {
                    Arc::new(LintingEventHandler::new(ctx)) as Arc<dyn EventHandler>
                })
                .await?;
            consumers.push(spawn(EventKind::Linting, consumer));
        }

        info!(
            consumers = consumers.len(),
            languages = ?self.service.registry().languages(),
            "WorkerRuntime started"
        );

        Ok(WorkerRuntime { consumers })
    }

    async fn consumer<F>(
        &self,
        settings: &StreamSettings,
        make_handler: F,
    ) -> Result<StreamConsumer>
    where
        F: FnOnce(HandlerContext) -> Arc<dyn EventHandler>,
    {
        let backend = self.backends.connect().await?;
        let ctx = HandlerContext::new(
            self.service.clone(),
            self.content_store.clone(),
            backend.clone(),
            settings,
        )
        .with_max_attempts(self.max_attempts);

        let consumer = StreamConsumer::new(settings, backend, make_handler(ctx))
            .with_poll_timeout(self.poll_timeout)
            .with_batch_size(self.batch_size)
            .with_backoff(self.backoff);
        consumer.bootstrap().await?;
        Ok(consumer)
    }
}

struct RunningConsumer {
    kind: EventKind,
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

fn spawn(kind: EventKind, consumer: StreamConsumer) -> RunningConsumer {
    let shutdown = consumer.shutdown_handle();
    let handle = tokio::spawn(consumer.run());
    RunningConsumer {
        kind,
        handle,
        shutdown,
    }
}

/// A running worker that can be embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct WorkerRuntime {
    consumers: Vec<RunningConsumer>,
}

impl WorkerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> WorkerRuntimeBuilder {
        WorkerRuntimeBuilder::new()
    }

    /// Number of consumer tasks.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Check if every consumer task is still running.
    pub fn is_running(&self) -> bool {
        self.consumers.iter().all(|c| !c.handle.is_finished())
    }

    /// Gracefully shut down the runtime.
    ///
    /// Signals every consumer to stop, then waits for them. A record being
    /// handled when the signal arrives is finished and acked first.
    pub async fn shutdown(self) -> Result<()> {
        info!("WorkerRuntime shutting down...");

        for consumer in &self.consumers {
            consumer.shutdown.notify_one();
        }

        let mut panicked = 0;
        for consumer in self.consumers {
            if let Err(e) = consumer.handle.await {
                error!(topic = %consumer.kind, "Consumer task panicked: {}", e);
                panicked += 1;
            }
        }

        if panicked > 0 {
            return Err(anyhow::anyhow!("{} consumer task(s) panicked", panicked));
        }

        info!("WorkerRuntime shutdown complete");
        Ok(())
    }
}
