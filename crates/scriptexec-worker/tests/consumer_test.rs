// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the stream consumer loop and the embeddable runtime, run against
//! the in-memory stream backend.

mod common;

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use common::*;
use scriptexec_core::engine::MockEngine;
use scriptexec_worker::backoff::BackoffConfig;
use scriptexec_worker::config::StreamSettings;
use scriptexec_worker::handler::{
    EventHandler, FormattingEventHandler, HandlerOutcome, LintingEventHandler,
};
use scriptexec_worker::runtime::WorkerRuntime;
use scriptexec_worker::stream::{InMemoryStreamBackend, StreamBackend, StreamConsumer};

const SOURCE: &str = "println('hi');";

fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        initial: Duration::from_millis(5),
        max: Duration::from_millis(20),
        jitter: 0.0,
    }
}

fn formatting_consumer(
    store: Arc<RecordingContentStore>,
    backend: &InMemoryStreamBackend,
    streams: &StreamSettings,
) -> StreamConsumer {
    let engine = Arc::new(MockEngine::new("printscript").with_formatted("formatted"));
    let handler: Arc<dyn EventHandler> = Arc::new(FormattingEventHandler::new(context(
        engine, store, backend, streams,
    )));
    StreamConsumer::new(streams, Arc::new(backend.clone()), handler)
        .with_poll_timeout(Duration::from_millis(20))
        .with_backoff(fast_backoff())
}

async fn publish(backend: &InMemoryStreamBackend, stream: &str, subject_id: Uuid, attempt: u32) {
    let payload = serde_json::to_string(&event(subject_id, attempt)).unwrap();
    backend.publish(stream, &payload).await.unwrap();
}

/// Poll `condition` until it holds, failing the test after five seconds.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(Arc::new(RecordingContentStore::new()), &backend, &streams);

    consumer.bootstrap().await.unwrap();
    consumer.bootstrap().await.unwrap();

    assert_eq!(backend.group_count(&streams.key), 1);
    assert_eq!(consumer.state().stream_key, "snippets.formatting");
    assert_eq!(consumer.state().group_name, "execution-formatting");
}

#[tokio::test]
async fn test_concurrent_bootstrap_creates_one_group() {
    let backend = InMemoryStreamBackend::new();
    let streams = linting_streams();
    let consumers: Vec<StreamConsumer> = (0..4)
        .map(|_| formatting_consumer(Arc::new(RecordingContentStore::new()), &backend, &streams))
        .collect();

    let results = futures::future::join_all(consumers.iter().map(|c| c.bootstrap())).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(backend.group_count(&streams.key), 1);
}

#[tokio::test]
async fn test_poll_once_handles_and_acks() {
    let id = Uuid::new_v4();
    let store = Arc::new(RecordingContentStore::new().with_content(id, SOURCE));
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(store.clone(), &backend, &streams);

    consumer.bootstrap().await.unwrap();
    publish(&backend, &streams.key, id, 0).await;

    let outcomes = consumer.poll_once().await.unwrap();

    assert_eq!(outcomes, vec![HandlerOutcome::Processed]);
    assert_eq!(backend.pending_count(&streams.key, &streams.group), 0);
    assert!(store
        .calls()
        .contains(&StoreCall::SaveFormatted(id, "formatted".into())));
}

#[tokio::test]
async fn test_group_starts_at_stream_tail() {
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let store = Arc::new(RecordingContentStore::new());
    let consumer = formatting_consumer(store.clone(), &backend, &streams);

    publish(&backend, &streams.key, Uuid::new_v4(), 0).await;
    consumer.bootstrap().await.unwrap();

    assert!(consumer.poll_once().await.unwrap().is_empty());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_dropped_record_is_still_acked() {
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(Arc::new(RecordingContentStore::new()), &backend, &streams);

    consumer.bootstrap().await.unwrap();
    backend.publish(&streams.key, "not json").await.unwrap();

    assert_eq!(
        consumer.poll_once().await.unwrap(),
        vec![HandlerOutcome::Dropped]
    );
    assert_eq!(backend.pending_count(&streams.key, &streams.group), 0);
}

#[tokio::test]
async fn test_run_recovers_from_read_errors() {
    let id = Uuid::new_v4();
    let store = Arc::new(RecordingContentStore::new().with_content(id, SOURCE));
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(store.clone(), &backend, &streams);

    consumer.bootstrap().await.unwrap();
    backend.fail_next_reads(3);
    publish(&backend, &streams.key, id, 0).await;

    let shutdown = consumer.shutdown_handle();
    let handle = tokio::spawn(consumer.run());

    wait_until(|| store.calls().contains(&StoreCall::SaveFormatted(id, "formatted".into()))).await;
    wait_until(|| backend.pending_count(&streams.key, &streams.group) == 0).await;

    shutdown.notify_one();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_run_creates_missing_group() {
    let id = Uuid::new_v4();
    let store = Arc::new(RecordingContentStore::new().with_content(id, SOURCE));
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(store.clone(), &backend, &streams);

    let shutdown = consumer.shutdown_handle();
    let handle = tokio::spawn(consumer.run());

    wait_until(|| backend.group_count(&streams.key) == 1).await;
    publish(&backend, &streams.key, id, 0).await;
    wait_until(|| store.calls().len() == 2).await;

    shutdown.notify_one();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_idle_consumer_stops_within_poll_timeout() {
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(Arc::new(RecordingContentStore::new()), &backend, &streams)
        .with_poll_timeout(Duration::from_millis(200));

    let shutdown = consumer.shutdown_handle();
    let handle = tokio::spawn(consumer.run());

    wait_until(|| backend.group_count(&streams.key) == 1).await;
    shutdown.notify_one();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("consumer did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_finishes_in_flight_read() {
    let id = Uuid::new_v4();
    let store = Arc::new(RecordingContentStore::new().with_content(id, SOURCE));
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(store.clone(), &backend, &streams)
        .with_poll_timeout(Duration::from_secs(2));

    consumer.bootstrap().await.unwrap();
    let shutdown = consumer.shutdown_handle();
    let handle = tokio::spawn(consumer.run());

    // Let the consumer block in its read, then stop it while the read is open.
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.notify_one();
    publish(&backend, &streams.key, id, 0).await;

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer did not stop")
        .unwrap();

    // Whatever the read picked up was handled and acked, not stranded.
    assert_eq!(backend.pending_count(&streams.key, &streams.group), 0);
    assert!(store
        .calls()
        .contains(&StoreCall::SaveFormatted(id, "formatted".into())));
}

#[tokio::test]
async fn test_requeued_events_are_redelivered_until_dead_lettered() {
    let id = Uuid::new_v4();
    let store = Arc::new(RecordingContentStore::new().failing_reads(503));
    let backend = InMemoryStreamBackend::new();
    let streams = formatting_streams();
    let consumer = formatting_consumer(store.clone(), &backend, &streams);

    consumer.bootstrap().await.unwrap();
    publish(&backend, &streams.key, id, 0).await;

    let shutdown = consumer.shutdown_handle();
    let handle = tokio::spawn(consumer.run());

    wait_until(|| backend.entries(&streams.dlq_key).len() == 1).await;

    let attempts: Vec<u32> = backend
        .entries(&streams.key)
        .iter()
        .map(|p| decode(p).attempt)
        .collect();
    assert_eq!(attempts, vec![0, 1, 2, 3]);
    assert_eq!(decode(&backend.entries(&streams.dlq_key)[0]).attempt, 3);
    wait_until(|| store.mark_failed_calls() == 1).await;

    shutdown.notify_one();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer did not stop")
        .unwrap();

    assert_eq!(backend.pending_count(&streams.key, &streams.group), 0);
}

#[tokio::test]
async fn test_runtime_runs_both_consumers() {
    let formatted = Uuid::new_v4();
    let linted = Uuid::new_v4();
    let store = Arc::new(
        RecordingContentStore::new()
            .with_content(formatted, SOURCE)
            .with_content(linted, SOURCE),
    );
    let backend = InMemoryStreamBackend::new();
    let engine = Arc::new(MockEngine::new("printscript").with_formatted("formatted"));

    let runtime = WorkerRuntime::builder()
        .service(service_with(engine))
        .content_store(store.clone())
        .backends(Arc::new(backend.clone()))
        .formatting(formatting_streams())
        .linting(linting_streams())
        .poll_timeout(Duration::from_millis(20))
        .backoff(fast_backoff())
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();

    assert_eq!(runtime.consumer_count(), 2);
    assert!(runtime.is_running());
    // Groups exist as soon as start returns.
    assert_eq!(backend.group_count(&formatting_streams().key), 1);
    assert_eq!(backend.group_count(&linting_streams().key), 1);

    publish(&backend, &formatting_streams().key, formatted, 0).await;
    publish(&backend, &linting_streams().key, linted, 0).await;

    wait_until(|| {
        let calls = store.calls();
        calls.contains(&StoreCall::SaveFormatted(formatted, "formatted".into()))
            && calls.contains(&StoreCall::SaveLint(linted, Vec::new()))
    })
    .await;

    tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("runtime did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_runtime_without_streams_starts_nothing() {
    let runtime = WorkerRuntime::builder()
        .service(service_with(Arc::new(MockEngine::new("printscript"))))
        .content_store(Arc::new(RecordingContentStore::new()))
        .backends(Arc::new(InMemoryStreamBackend::new()))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();

    assert_eq!(runtime.consumer_count(), 0);
    runtime.shutdown().await.unwrap();
}

#[test]
fn test_builder_requires_dependencies() {
    let err = WorkerRuntime::builder()
        .content_store(Arc::new(RecordingContentStore::new()))
        .backends(Arc::new(InMemoryStreamBackend::new()))
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("service is required"));

    let err = WorkerRuntime::builder()
        .service(service_with(Arc::new(MockEngine::new("printscript"))))
        .backends(Arc::new(InMemoryStreamBackend::new()))
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("content_store is required"));
}

#[tokio::test]
async fn test_linting_handler_behind_consumer() {
    let id = Uuid::new_v4();
    let store = Arc::new(RecordingContentStore::new().with_content(id, SOURCE));
    let backend = InMemoryStreamBackend::new();
    let streams = linting_streams();
    let handler: Arc<dyn EventHandler> = Arc::new(LintingEventHandler::new(context(
        Arc::new(MockEngine::new("printscript")),
        store.clone(),
        &backend,
        &streams,
    )));
    let consumer = StreamConsumer::new(&streams, Arc::new(backend.clone()), handler)
        .with_poll_timeout(Duration::ZERO)
        .with_batch_size(1);

    consumer.bootstrap().await.unwrap();
    publish(&backend, &streams.key, id, 0).await;
    publish(&backend, &streams.key, id, 0).await;

    // One record per read.
    assert_eq!(consumer.poll_once().await.unwrap().len(), 1);
    assert_eq!(consumer.poll_once().await.unwrap().len(), 1);
    assert!(consumer.poll_once().await.unwrap().is_empty());
}
