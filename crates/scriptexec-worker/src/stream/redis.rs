// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Redis Streams backend.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::streams::{StreamInfoGroupsReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{PAYLOAD_FIELD, Result, StreamBackend, StreamBackendFactory, StreamError, StreamRecord};

/// Extra time granted to a response beyond the read block timeout.
const RESPONSE_MARGIN: Duration = Duration::from_secs(5);

/// Stream backend over one Redis connection.
#[derive(Clone)]
pub struct RedisStreamBackend {
    conn: ConnectionManager,
}

impl RedisStreamBackend {
    /// Connect to Redis. `max_block` is the longest read block timeout that
    /// will be requested on this connection.
    pub async fn connect(client: &Client, max_block: Duration) -> Result<Self> {
        let config = ConnectionManagerConfig::new().set_response_timeout(max_block + RESPONSE_MARGIN);
        let conn = ConnectionManager::new_with_config(client.clone(), config).await?;
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for RedisStreamBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamBackend").finish_non_exhaustive()
    }
}

fn is_busy_group(e: &RedisError) -> bool {
    e.code() == Some("BUSYGROUP")
}

fn is_no_group(e: &RedisError) -> bool {
    e.code() == Some("NOGROUP")
}

fn is_no_such_key(e: &RedisError) -> bool {
    e.kind() == ErrorKind::ResponseError && e.to_string().contains("no such key")
}

#[async_trait]
impl StreamBackend for RedisStreamBackend {
    async fn group_exists(&self, stream: &str, group: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: std::result::Result<StreamInfoGroupsReply, RedisError> =
            conn.xinfo_groups(stream).await;
        match reply {
            Ok(reply) => Ok(reply.groups.iter().any(|g| g.name == group)),
            Err(e) if is_no_such_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_group(&self, stream: &str, group: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let created: std::result::Result<(), RedisError> =
            conn.xgroup_create_mkstream(stream, group, "$").await;
        match created {
            Ok(()) => {
                info!(stream = %stream, group = %group, "Created consumer group");
                Ok(true)
            }
            Err(e) if is_busy_group(&e) => {
                debug!(stream = %stream, group = %group, "Consumer group already exists");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block.as_millis() as usize);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[">"], &options)
            .await
            .map_err(|e| {
                if is_no_group(&e) {
                    StreamError::NoGroup {
                        stream: stream.to_string(),
                        group: group.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        let records = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .map(|entry| StreamRecord {
                payload: entry.get::<String>(PAYLOAD_FIELD),
                id: entry.id,
            })
            .collect();
        Ok(records)
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(stream, group, ids).await?;
        Ok(())
    }

    async fn publish(&self, stream: &str, payload: &str) -> Result<String> {
        let mut conn = self.conn.clone();
        let id: String = conn.xadd(stream, "*", &[(PAYLOAD_FIELD, payload)]).await?;
        Ok(id)
    }
}

/// Opens a [`RedisStreamBackend`] with a dedicated connection per call.
#[derive(Debug, Clone)]
pub struct RedisBackendFactory {
    client: Client,
    max_block: Duration,
}

impl RedisBackendFactory {
    /// Create a factory for `redis_url`.
    pub fn new(redis_url: &str, max_block: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::open(redis_url)?,
            max_block,
        })
    }
}

#[async_trait]
impl StreamBackendFactory for RedisBackendFactory {
    async fn connect(&self) -> Result<Arc<dyn StreamBackend>> {
        let backend = RedisStreamBackend::connect(&self.client, self.max_block).await?;
        Ok(Arc::new(backend))
    }
}
