//! Queue decorator instrumenting push and pop.

use super::publish;
use crate::config::CluesConfig;
use crate::envelope::JobEnvelope;
use crate::event::{Event, EventType};
use crate::metadata::elapsed_since;
use crate::queue::QueueBackend;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

/// A [`QueueBackend`] wrapping another backend with lifecycle instrumentation.
///
/// On push the item is stamped with a correlation id, the host name, process
/// id and enqueue time, and an `enqueued` event is published. On pop the time
/// spent in the queue is recorded and a `dequeued` event is published. The
/// wrapped backend's results and errors are returned verbatim, and the
/// undecorated operations stay reachable through [`base_push`] and
/// [`base_pop`].
///
/// [`base_push`]: InstrumentedQueue::base_push
/// [`base_pop`]: InstrumentedQueue::base_pop
///
/// # Examples
///
/// ```rust
/// use cluesq::prelude::*;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> CluesResult<()> {
/// let config = CluesConfig::new(Arc::new(StandardOutPublisher::new()));
/// let queue = InstrumentedQueue::new(InMemoryQueue::new(), config);
///
/// queue.push("mailers", JobEnvelope::new("WelcomeEmail", vec![json!(42)])).await?;
/// let item = queue.pop("mailers").await?.expect("item was just pushed");
/// assert!(item.metadata.unwrap().time_in_queue.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InstrumentedQueue<Q> {
    inner: Q,
    config: CluesConfig,
}

impl<Q: QueueBackend> InstrumentedQueue<Q> {
    /// Wrap `inner` using `config`.
    pub fn new(inner: Q, config: CluesConfig) -> Self {
        Self { inner, config }
    }

    /// The undecorated push operation.
    pub async fn base_push(&self, queue: &str, item: JobEnvelope) -> Result<Q::PushOutput, Q::Error> {
        self.inner.push(queue, item).await
    }

    /// The undecorated pop operation.
    pub async fn base_pop(&self, queue: &str) -> Result<Option<JobEnvelope>, Q::Error> {
        self.inner.pop(queue).await
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Q {
        &self.inner
    }

    /// Unwrap the decorator.
    pub fn into_inner(self) -> Q {
        self.inner
    }

    /// Active configuration.
    pub fn config(&self) -> &CluesConfig {
        &self.config
    }

    /// Stamp enqueue metadata on an item and run the preprocessor.
    fn prepare_enqueue(&self, queue: &str, item: &mut JobEnvelope) -> chrono::DateTime<Utc> {
        item.ensure_metadata().ensure_event_hash();

        if let Some(preprocessor) = &self.config.preprocessor {
            preprocessor.mutate(queue, item);
        }

        let now = Utc::now();
        let metadata = item.ensure_metadata();
        // The preprocessor may have replaced the whole mapping or written
        // lifecycle keys straight into `extra`.
        metadata.absorb_reserved();
        metadata.ensure_event_hash();
        metadata.stamp_origin();
        metadata.enqueued_time = Some(now);
        now
    }
}

#[async_trait]
impl<Q: QueueBackend> QueueBackend for InstrumentedQueue<Q> {
    type PushOutput = Q::PushOutput;
    type Error = Q::Error;

    async fn push(&self, queue: &str, mut item: JobEnvelope) -> Result<Self::PushOutput, Self::Error> {
        if !self.config.is_enabled() {
            return self.base_push(queue, item).await;
        }

        let now = self.prepare_enqueue(queue, &mut item);
        tracing::debug!(
            "Enqueueing {} on {} with event hash {}",
            item.class,
            queue,
            item.metadata
                .as_ref()
                .and_then(|m| m.event_hash.as_deref())
                .unwrap_or_default()
        );

        publish(&self.config, Event::new(EventType::Enqueued, now, queue, &item)).await;
        self.base_push(queue, item).await
    }

    async fn pop(&self, queue: &str) -> Result<Option<JobEnvelope>, Self::Error> {
        let popped = self.base_pop(queue).await?;

        let mut item = match popped {
            Some(item) if self.config.is_enabled() && item.has_metadata() => item,
            other => return Ok(other),
        };

        let now = Utc::now();
        let metadata = item.ensure_metadata();
        metadata.time_in_queue = Some(
            metadata
                .enqueued_time
                .map(|enqueued| elapsed_since(enqueued, now))
                .unwrap_or(Duration::ZERO),
        );
        metadata.stamp_origin();

        publish(&self.config, Event::new(EventType::Dequeued, now, queue, &item)).await;
        Ok(Some(item))
    }
}
