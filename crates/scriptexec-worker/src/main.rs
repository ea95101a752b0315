// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! scriptexec Worker - Rules-Updated Stream Consumer
//!
//! A long-running process responsible for:
//! - Re-formatting snippets when formatting rules change
//! - Re-linting snippets when linting rules change
//! - Requeueing failed events and dead-lettering them past the retry cap

use std::sync::Arc;
use tracing::{info, warn};

use scriptexec_core::engine::ProcessEngine;
use scriptexec_core::{EngineRegistry, ExecutionEngine, ExecutionService};
use scriptexec_worker::config::Config;
use scriptexec_worker::content_store::HttpContentStore;
use scriptexec_worker::runtime::WorkerRuntime;
use scriptexec_worker::stream::RedisBackendFactory;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scriptexec_worker=info,scriptexec_core=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_tracing();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        content_store = %config.content_store.base_url,
        streams_enabled = config.streams_enabled,
        "Starting scriptexec worker"
    );

    // Register one process engine per configured language
    let engines = config.engines.iter().map(|spec| {
        Arc::new(
            ProcessEngine::new(&spec.language, &spec.command)
                .with_args(spec.args.clone())
                .with_timeout(config.engine_timeout),
        ) as Arc<dyn ExecutionEngine>
    });
    let service = ExecutionService::new(EngineRegistry::new(engines));

    let store = Arc::new(HttpContentStore::new(&config.content_store)?);
    let backends = Arc::new(RedisBackendFactory::new(
        &config.redis_url,
        config.poll_timeout,
    )?);

    let mut builder = WorkerRuntime::builder()
        .service(service)
        .content_store(store)
        .backends(backends)
        .max_attempts(config.max_attempts)
        .poll_timeout(config.poll_timeout);

    if config.streams_enabled {
        builder = builder
            .formatting(config.formatting.clone())
            .linting(config.linting.clone());
    } else {
        info!("Streams disabled; no consumers will be started");
    }

    let runtime = builder.build()?.start().await?;

    info!(consumers = runtime.consumer_count(), "Worker ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Graceful shutdown
    runtime.shutdown().await?;

    info!("scriptexec worker shut down");

    Ok(())
}
