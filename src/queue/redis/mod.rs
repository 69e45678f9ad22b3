//! Redis queue implementation for cluesq.
//!
//! Uses the Resque storage layout: every queue is a Redis list at
//! `<prefix>:queue:<name>` holding JSON envelopes, and queue names are
//! registered in the `<prefix>:queues` set. Items pushed by an instrumented
//! producer can therefore be popped by an instrumented consumer in another
//! process, with the metadata surviving the trip through Redis.

use super::QueueBackend;
use crate::config::{QueueConfig, RedisConfig};
use crate::envelope::JobEnvelope;
use crate::error::{CluesError, CluesResult};
use async_trait::async_trait;

use redis::{AsyncCommands, Client, aio::ConnectionManager};

use std::future::Future;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Redis queue backend implementation
#[derive(Clone)]
pub struct RedisQueue {
    /// Redis connection manager
    conn: ConnectionManager,
    /// Queue configuration
    config: QueueConfig,
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisQueue {
    /// Create a new Redis queue with the given connection string and configuration
    pub async fn new(connection_string: &str, config: QueueConfig) -> CluesResult<Self> {
        let config = config.validated()?;
        let client = Client::open(connection_string).map_err(|e| CluesError::QueueError {
            message: format!("Failed to create Redis client: {}", e),
            source: Some(Box::new(e)),
        })?;

        let conn = timeout(config.operation_timeout(), client.get_connection_manager())
            .await
            .map_err(|e| CluesError::QueueError {
                message: "Timed out connecting to Redis".to_string(),
                source: Some(Box::new(e)),
            })?
            .map_err(|e| CluesError::QueueError {
                message: format!("Failed to create Redis connection manager: {}", e),
                source: Some(Box::new(e)),
            })?;

        debug!("Connected to Redis queue with prefix {}", config.key_prefix);

        Ok(Self { conn, config })
    }

    /// Create a new Redis queue from the `redis` section of the configuration
    pub async fn from_config(config: QueueConfig) -> CluesResult<Self> {
        let redis_config: RedisConfig = config
            .redis
            .clone()
            .ok_or_else(|| CluesError::config("Redis configuration not found in queue config"))?;

        let connection_string = if redis_config.db == 0 {
            redis_config.connection_string
        } else {
            format!(
                "{}/{}",
                redis_config.connection_string.trim_end_matches('/'),
                redis_config.db
            )
        };

        Self::new(&connection_string, config).await
    }

    /// Get Redis key for a queue's list
    fn queue_key(&self, queue: &str) -> String {
        format!("{}:queue:{}", self.config.key_prefix, queue)
    }

    /// Get Redis key for the set of known queue names
    fn queues_key(&self) -> String {
        format!("{}:queues", self.config.key_prefix)
    }

    /// Run a Redis command, bounded by the configured operation timeout
    async fn bounded<T, F>(&self, action: &str, command: F) -> CluesResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        timeout(self.config.operation_timeout(), command)
            .await
            .map_err(|e| CluesError::QueueError {
                message: format!("Timed out trying to {}", action),
                source: Some(Box::new(e)),
            })?
            .map_err(|e| CluesError::QueueError {
                message: format!("Failed to {}: {}", action, e),
                source: Some(Box::new(e)),
            })
    }

    /// Number of items waiting in the named queue
    pub async fn len(&self, queue: &str) -> CluesResult<usize> {
        let mut conn = self.conn.clone();
        let key = self.queue_key(queue);
        self.bounded(&format!("read length of {}", queue), conn.llen(key))
            .await
    }

    /// Delete the named queue and unregister it, returning how many items were dropped
    pub async fn remove_queue(&self, queue: &str) -> CluesResult<usize> {
        let mut conn = self.conn.clone();
        let (dropped, _, _): (usize, usize, usize) = redis::pipe()
            .atomic()
            .llen(self.queue_key(queue))
            .del(self.queue_key(queue))
            .srem(self.queues_key(), queue)
            .query_async(&mut conn)
            .await?;
        Ok(dropped)
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    type PushOutput = usize;
    type Error = CluesError;

    async fn push(&self, queue: &str, item: JobEnvelope) -> CluesResult<usize> {
        let mut conn = self.conn.clone();
        let data = item.to_json()?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .sadd(self.queues_key(), queue)
            .rpush(self.queue_key(queue), &data);
        let (_, len): (usize, usize) = self
            .bounded(&format!("push onto {}", queue), pipe.query_async(&mut conn))
            .await?;

        trace!("Pushed {} onto {}", item.class, self.queue_key(queue));
        Ok(len)
    }

    async fn pop(&self, queue: &str) -> CluesResult<Option<JobEnvelope>> {
        let mut conn = self.conn.clone();

        let key = self.queue_key(queue);
        let data: Option<String> = self
            .bounded(&format!("pop from {}", queue), conn.lpop(key, None))
            .await?;

        data.map(|data| JobEnvelope::from_json(&data)).transpose()
    }
}
