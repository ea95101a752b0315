// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test utilities for worker integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use scriptexec_core::engine::MockEngine;
use scriptexec_core::{
    Diagnostic, EngineRegistry, EventKind, ExecutionEngine, ExecutionService, RulesUpdatedEvent,
};
use scriptexec_worker::config::StreamSettings;
use scriptexec_worker::content_store::{ContentStore, ContentStoreError};
use scriptexec_worker::handler::HandlerContext;
use scriptexec_worker::stream::{InMemoryStreamBackend, StreamBackend, StreamRecord};

/// A call received by [`RecordingContentStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    GetContent(Uuid),
    SaveFormatted(Uuid, String),
    SaveLint(Uuid, Vec<Diagnostic>),
    MarkFailed(Uuid, EventKind),
}

/// In-memory content store that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingContentStore {
    contents: Mutex<HashMap<Uuid, String>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_reads_with: Mutex<Option<u16>>,
    fail_mark_failed: Mutex<bool>,
}

impl RecordingContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(self, id: Uuid, content: &str) -> Self {
        self.contents.lock().unwrap().insert(id, content.to_string());
        self
    }

    /// Answer every `get_content` with this HTTP status.
    pub fn failing_reads(self, status: u16) -> Self {
        *self.fail_reads_with.lock().unwrap() = Some(status);
        self
    }

    pub fn failing_mark_failed(self) -> Self {
        *self.fail_mark_failed.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mark_failed_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::MarkFailed(..)))
            .count()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContentStore for RecordingContentStore {
    async fn get_content(&self, subject_id: Uuid) -> Result<String, ContentStoreError> {
        self.record(StoreCall::GetContent(subject_id));
        if let Some(status) = *self.fail_reads_with.lock().unwrap() {
            return Err(ContentStoreError::Http {
                status,
                body: "unavailable".into(),
            });
        }
        self.contents
            .lock()
            .unwrap()
            .get(&subject_id)
            .cloned()
            .ok_or(ContentStoreError::MissingContent(subject_id))
    }

    async fn save_formatted(
        &self,
        subject_id: Uuid,
        content: &str,
    ) -> Result<(), ContentStoreError> {
        self.record(StoreCall::SaveFormatted(subject_id, content.to_string()));
        Ok(())
    }

    async fn save_lint(
        &self,
        subject_id: Uuid,
        violations: &[Diagnostic],
    ) -> Result<(), ContentStoreError> {
        self.record(StoreCall::SaveLint(subject_id, violations.to_vec()));
        Ok(())
    }

    async fn mark_failed(
        &self,
        subject_id: Uuid,
        kind: EventKind,
    ) -> Result<(), ContentStoreError> {
        self.record(StoreCall::MarkFailed(subject_id, kind));
        if *self.fail_mark_failed.lock().unwrap() {
            return Err(ContentStoreError::Http {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(())
    }
}

pub fn formatting_streams() -> StreamSettings {
    StreamSettings::new("snippets.formatting", "execution-formatting")
}

pub fn linting_streams() -> StreamSettings {
    StreamSettings::new("snippets.linting", "execution-linting")
}

pub fn service_with(engine: Arc<MockEngine>) -> ExecutionService {
    ExecutionService::new(EngineRegistry::new([engine as Arc<dyn ExecutionEngine>]))
}

/// Handler context wired to the given fakes.
pub fn context(
    engine: Arc<MockEngine>,
    store: Arc<RecordingContentStore>,
    backend: &InMemoryStreamBackend,
    streams: &StreamSettings,
) -> HandlerContext {
    HandlerContext::new(
        service_with(engine),
        store as Arc<dyn ContentStore>,
        Arc::new(backend.clone()) as Arc<dyn StreamBackend>,
        streams,
    )
}

/// An event whose timestamp survives the millisecond wire format unchanged.
pub fn event(subject_id: Uuid, attempt: u32) -> RulesUpdatedEvent {
    let created_at = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
    RulesUpdatedEvent {
        attempt,
        correlation_id: Some("req-42".into()),
        created_at,
        ..RulesUpdatedEvent::new(subject_id, "printscript", "1.1")
    }
}

pub fn record(event: &RulesUpdatedEvent) -> StreamRecord {
    StreamRecord {
        id: "1-0".into(),
        payload: Some(serde_json::to_string(event).unwrap()),
    }
}

pub fn decode(payload: &str) -> RulesUpdatedEvent {
    serde_json::from_str(payload).unwrap()
}
