// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable event streams.
//!
//! [`StreamBackend`] is the minimal set of consumer-group operations the worker
//! needs. [`RedisStreamBackend`] talks to Redis Streams; [`InMemoryStreamBackend`]
//! keeps everything in process for tests and local runs.
//!
//! Every backend instance owns its own connection. A consumer blocks on reads,
//! so two consumers must never share one backend.

pub mod consumer;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use self::consumer::{ConsumerGroupState, StreamConsumer, consumer_identity};
pub use self::memory::InMemoryStreamBackend;
pub use self::redis::{RedisBackendFactory, RedisStreamBackend};

/// Name of the record field holding the JSON event.
pub const PAYLOAD_FIELD: &str = "payload";

/// Stream errors.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Redis command failed.
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The consumer group does not exist on the stream.
    #[error("Consumer group '{group}' does not exist on stream '{stream}'")]
    NoGroup {
        /// Stream key
        stream: String,
        /// Group name
        group: String,
    },

    /// An event could not be encoded for publishing.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Stream backend error: {0}")]
    Backend(String),
}

impl StreamError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Redis(_) => "STREAM_REDIS",
            Self::NoGroup { .. } => "STREAM_NO_GROUP",
            Self::Serialization(_) => "STREAM_SERIALIZATION",
            Self::Backend(_) => "STREAM_BACKEND",
        }
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// One delivered stream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Entry id assigned by the stream.
    pub id: String,
    /// The `payload` field, when present.
    pub payload: Option<String>,
}

/// Consumer-group operations over a stream store.
#[async_trait]
pub trait StreamBackend: Send + Sync {
    /// Whether `group` exists on `stream`.
    async fn group_exists(&self, stream: &str, group: &str) -> Result<bool>;

    /// Create `group` on `stream` at the stream's tail, creating the stream if
    /// needed. Returns `false` when the group already existed.
    async fn create_group(&self, stream: &str, group: &str) -> Result<bool>;

    /// Read up to `count` never-delivered entries for `consumer`, waiting at
    /// most `block` for the first one.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>>;

    /// Acknowledge delivered entries.
    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()>;

    /// Append `payload` to `stream`; returns the new entry id.
    async fn publish(&self, stream: &str, payload: &str) -> Result<String>;
}

/// Opens one backend per consumer.
#[async_trait]
pub trait StreamBackendFactory: Send + Sync {
    /// Open a backend with its own connection.
    async fn connect(&self) -> Result<Arc<dyn StreamBackend>>;
}

/// Normalize a configured stream or group name: trim surrounding whitespace
/// and strip quote characters that leak in from property files.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.trim()
        .replace("\\\"", "")
        .replace(['"', '\u{201C}', '\u{201D}', '\''], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("  snippets.linting "), "snippets.linting");
        assert_eq!(sanitize_identifier("\"snippets.formatting\""), "snippets.formatting");
        assert_eq!(sanitize_identifier("\\\"group\\\""), "group");
        assert_eq!(sanitize_identifier("\u{201C}group\u{201D}"), "group");
        assert_eq!(sanitize_identifier("'group'"), "group");
        assert_eq!(sanitize_identifier("plain"), "plain");
    }
}
