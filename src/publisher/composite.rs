//! Publisher fanning events out to several publishers.

use super::EventPublisher;
use crate::error::CluesResult;
use crate::event::Event;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers every event to each child publisher in order.
///
/// A failing child does not stop delivery to the remaining ones. The first
/// error is returned once all children have run.
#[derive(Clone, Default)]
pub struct CompositePublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl std::fmt::Debug for CompositePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositePublisher")
            .field(
                "publishers",
                &self.publishers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CompositePublisher {
    /// Create a composite with no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child publisher.
    pub fn with(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Add a child publisher in place.
    pub fn push(&mut self, publisher: Arc<dyn EventPublisher>) {
        self.publishers.push(publisher);
    }

    /// Number of child publishers.
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    /// Whether there are no child publishers.
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl From<Vec<Arc<dyn EventPublisher>>> for CompositePublisher {
    fn from(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl EventPublisher for CompositePublisher {
    async fn publish(&self, event: &Event) -> CluesResult<()> {
        let mut first_error = None;

        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(event).await {
                tracing::debug!(
                    "Publisher {} failed for {} event: {}",
                    publisher.name(),
                    event.event_type,
                    e
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::JobEnvelope;
    use crate::error::CluesError;
    use crate::event::EventType;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPublisher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventPublisher for CountingPublisher {
        async fn publish(&self, _event: &Event) -> CluesResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &Event) -> CluesResult<()> {
            Err(CluesError::publish("failing", "sink offline"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn event() -> Event {
        let item = JobEnvelope::new("TestWorker", vec![]);
        Event::new(EventType::Enqueued, Utc::now(), "test_queue", &item)
    }

    #[tokio::test]
    async fn test_delivers_to_every_child() {
        let first = Arc::new(CountingPublisher::default());
        let second = Arc::new(CountingPublisher::default());
        let composite = CompositePublisher::new()
            .with(first.clone())
            .with(second.clone());

        composite.publish(&event()).await.unwrap();

        assert_eq!(composite.len(), 2);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_child_does_not_block_others() {
        let counter = Arc::new(CountingPublisher::default());
        let composite = CompositePublisher::new()
            .with(Arc::new(FailingPublisher))
            .with(counter.clone());

        let result = composite.publish(&event()).await;

        assert!(result.is_err());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_composite_is_ok() {
        let composite = CompositePublisher::new();
        assert!(composite.is_empty());
        assert!(composite.publish(&event()).await.is_ok());
    }
}
