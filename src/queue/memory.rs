//! In-memory queue implementation for cluesq.
//!
//! Items are stored as serialized JSON strings, so an envelope pushed here
//! crosses the same serialization boundary it would cross in Redis. This
//! makes the backend suitable for exercising instrumentation end to end
//! in tests and single-process applications.

use super::QueueBackend;
use crate::config::QueueConfig;
use crate::envelope::JobEnvelope;
use crate::error::{CluesError, CluesResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory queue backend implementation
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    /// Serialized items per queue name (FIFO)
    queues: Arc<RwLock<HashMap<String, VecDeque<String>>>>,
    /// Queue configuration
    config: QueueConfig,
}

impl InMemoryQueue {
    /// Create a new in-memory queue with default configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a new in-memory queue with custom configuration
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Number of items waiting in the named queue
    pub async fn len(&self, queue: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Whether the named queue has no items
    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }

    /// Names of all queues that ever received an item
    pub async fn queue_names(&self) -> Vec<String> {
        let queues = self.queues.read().await;
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw serialized items of the named queue, oldest first
    pub async fn peek_raw(&self, queue: &str) -> Vec<String> {
        let queues = self.queues.read().await;
        queues
            .get(queue)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove all items from every queue, returning how many were dropped
    pub async fn purge(&self) -> usize {
        let mut queues = self.queues.write().await;
        let purged = queues.values().map(VecDeque::len).sum();
        queues.clear();
        tracing::debug!("Purged {} items from {} memory queue", purged, self.config.key_prefix);
        purged
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueue {
    type PushOutput = usize;
    type Error = CluesError;

    async fn push(&self, queue: &str, item: JobEnvelope) -> CluesResult<usize> {
        let data = item.to_json()?;
        let mut queues = self.queues.write().await;
        let items = queues.entry(queue.to_string()).or_default();
        items.push_back(data);

        tracing::trace!("Pushed {} onto {}:queue:{}", item.class, self.config.key_prefix, queue);
        Ok(items.len())
    }

    async fn pop(&self, queue: &str) -> CluesResult<Option<JobEnvelope>> {
        let data = {
            let mut queues = self.queues.write().await;
            queues.get_mut(queue).and_then(VecDeque::pop_front)
        };

        data.map(|data| JobEnvelope::from_json(&data)).transpose()
    }
}
