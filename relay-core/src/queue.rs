//! Queue store: two append-only, FIFO, non-destructive-read queues
//! (`messages` and `approved_messages`) shared by every service instance.
//!
//! Reads never remove or lock entries. Concurrent appends are ordered by the
//! store itself; no dedup and no idempotency keys are applied here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use relay_protocol::message::QueueName;
use tracing::debug;

use crate::errors::{RelayError, Result};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends `value` to the tail of `queue` and returns the new length.
    async fn enqueue(&self, queue: QueueName, value: &str) -> Result<u64>;

    /// Oldest-first snapshot of `queue`.
    async fn read_all(&self, queue: QueueName) -> Result<Vec<String>>;
}

/// Redis-backed queue store: `RPUSH` to append, `LRANGE 0 -1` to read.
#[derive(Clone)]
pub struct RedisQueueStore {
    conn_manager: ConnectionManager,
}

impl RedisQueueStore {
    /// Connects to Redis at `redis_url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|err| {
            RelayError::QueueError(format!("failed to create Redis client: {err}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|err| {
            RelayError::QueueError(format!("failed to connect to Redis at {redis_url}: {err}"))
        })?;

        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn enqueue(&self, queue: QueueName, value: &str) -> Result<u64> {
        let mut conn = self.conn_manager.clone();
        let length: u64 = conn.rpush(queue.key(), value).await?;
        debug!(queue = %queue, length, "appended to queue");
        Ok(length)
    }

    async fn read_all(&self, queue: QueueName) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let values: Vec<String> = conn.lrange(queue.key(), 0, -1).await?;
        Ok(values)
    }
}

/// Process-local queue store with the same semantics as the Redis one.
#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    queues: Arc<RwLock<HashMap<QueueName, Vec<String>>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, queue: QueueName, value: &str) -> Result<u64> {
        let mut queues = self.queues.write();
        let entries = queues.entry(queue).or_default();
        entries.push(value.to_string());
        Ok(entries.len() as u64)
    }

    async fn read_all(&self, queue: QueueName) -> Result<Vec<String>> {
        let queues = self.queues.read();
        Ok(queues.get(&queue).cloned().unwrap_or_default())
    }
}
