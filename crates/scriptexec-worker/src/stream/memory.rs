// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process stream backend.
//!
//! Mirrors the consumer-group semantics the worker relies on: groups start at
//! the stream tail, `read_group` hands out never-delivered entries, delivered
//! entries stay pending until acked. Clones share the same streams.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

use super::{Result, StreamBackend, StreamBackendFactory, StreamError, StreamRecord};

#[derive(Debug, Default)]
struct GroupState {
    /// Index of the next entry to deliver.
    next: usize,
    pending: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MemoryStream {
    entries: Vec<(String, String)>,
    groups: HashMap<String, GroupState>,
}

#[derive(Debug, Default)]
struct State {
    streams: HashMap<String, MemoryStream>,
    sequence: u64,
    failing_reads: u32,
}

/// Stream backend that keeps entries in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStreamBackend {
    state: Arc<Mutex<State>>,
    appended: Arc<Notify>,
}

impl InMemoryStreamBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Payloads appended to `stream`, oldest first.
    pub fn entries(&self, stream: &str) -> Vec<String> {
        self.lock()
            .streams
            .get(stream)
            .map(|s| s.entries.iter().map(|(_, p)| p.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of groups on `stream`.
    pub fn group_count(&self, stream: &str) -> usize {
        self.lock()
            .streams
            .get(stream)
            .map_or(0, |s| s.groups.len())
    }

    /// Number of delivered but unacknowledged entries of `group`.
    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        self.lock()
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.pending.len())
    }

    /// Make the next `n` reads fail with a backend error.
    pub fn fail_next_reads(&self, n: u32) {
        self.lock().failing_reads = n;
    }

    fn take_batch(&self, stream: &str, group: &str, count: usize) -> Result<Vec<StreamRecord>> {
        let mut state = self.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(StreamError::Backend("injected read failure".to_string()));
        }

        let no_group = || StreamError::NoGroup {
            stream: stream.to_string(),
            group: group.to_string(),
        };
        let s = state.streams.get_mut(stream).ok_or_else(no_group)?;
        let g = s.groups.get_mut(group).ok_or_else(no_group)?;

        let end = s.entries.len().min(g.next + count.max(1));
        let batch: Vec<StreamRecord> = s.entries[g.next..end]
            .iter()
            .map(|(id, payload)| StreamRecord {
                id: id.clone(),
                payload: Some(payload.clone()),
            })
            .collect();
        g.next = end;
        g.pending.extend(batch.iter().map(|r| r.id.clone()));
        Ok(batch)
    }
}

#[async_trait]
impl StreamBackend for InMemoryStreamBackend {
    async fn group_exists(&self, stream: &str, group: &str) -> Result<bool> {
        Ok(self
            .lock()
            .streams
            .get(stream)
            .is_some_and(|s| s.groups.contains_key(group)))
    }

    async fn create_group(&self, stream: &str, group: &str) -> Result<bool> {
        let mut state = self.lock();
        let s = state.streams.entry(stream.to_string()).or_default();
        if s.groups.contains_key(group) {
            return Ok(false);
        }
        let tail = s.entries.len();
        s.groups.insert(
            group.to_string(),
            GroupState {
                next: tail,
                pending: BTreeSet::new(),
            },
        );
        Ok(true)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>> {
        // Register interest before checking, so an append in between is not missed.
        let appended = self.appended.notified();
        let batch = self.take_batch(stream, group, count)?;
        if !batch.is_empty() || block.is_zero() {
            return Ok(batch);
        }
        let _ = tokio::time::timeout(block, appended).await;
        self.take_batch(stream, group, count)
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()> {
        let mut state = self.lock();
        if let Some(g) = state
            .streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
        {
            for id in ids {
                g.pending.remove(id);
            }
        }
        Ok(())
    }

    async fn publish(&self, stream: &str, payload: &str) -> Result<String> {
        let id = {
            let mut state = self.lock();
            state.sequence += 1;
            let id = format!("{}-0", state.sequence);
            state
                .streams
                .entry(stream.to_string())
                .or_default()
                .entries
                .push((id.clone(), payload.to_string()));
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }
}

#[async_trait]
impl StreamBackendFactory for InMemoryStreamBackend {
    async fn connect(&self) -> Result<Arc<dyn StreamBackend>> {
        Ok(Arc::new(self.clone()))
    }
}
