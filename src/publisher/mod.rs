//! Publishers receive lifecycle events and ship them somewhere.
//!
//! cluesq ships several publishers:
//! - **Stream**: one line per event to any writer; [`StandardOutPublisher`]
//!   and [`StandardErrPublisher`] are the stdout/stderr flavours
//! - **Log**: structured `tracing` records
//! - **Composite**: fans each event out to several publishers
//! - **Prometheus**: counters and timing histograms (requires the `metrics` feature)
//!
//! Any type implementing [`EventPublisher`] can be plugged into
//! [`CluesConfig`](crate::config::CluesConfig); the decorators never look at
//! the concrete type.
//!
//! # Examples
//!
//! ```rust
//! use cluesq::prelude::*;
//! use std::sync::Arc;
//!
//! let config = CluesConfig::disabled()
//!     .with_publisher(Arc::new(StandardOutPublisher::new()));
//! assert!(config.is_enabled());
//! ```

use crate::error::CluesResult;
use crate::event::Event;
use async_trait::async_trait;

pub mod composite;
pub mod log;
pub mod stream;

pub use composite::CompositePublisher;
pub use log::LogPublisher;
pub use stream::{StandardErrPublisher, StandardOutPublisher, StreamPublisher};

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub use metrics::PrometheusPublisher;

/// Trait that all event publishers must implement
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver one event.
    ///
    /// Called inline by the decorators: the decorated operation waits for
    /// this to return. Errors are logged by the caller and never reach the
    /// job pipeline.
    async fn publish(&self, event: &Event) -> CluesResult<()>;

    /// Short name used in logs and errors
    fn name(&self) -> &str {
        "publisher"
    }
}

/// Turns an event into a single line of text.
pub trait EventMarshaller: Send + Sync {
    /// Render the event. The result must not contain a newline.
    fn marshal(&self, event: &Event) -> CluesResult<String>;
}

/// Renders events as one JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl EventMarshaller for JsonMarshaller {
    fn marshal(&self, event: &Event) -> CluesResult<String> {
        Ok(serde_json::to_string(event)?)
    }
}

/// Renders events as `key=value` text meant for humans.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMarshaller;

impl EventMarshaller for TextMarshaller {
    fn marshal(&self, event: &Event) -> CluesResult<String> {
        Ok(format!(
            "{} {} queue={} class={} args={} metadata={}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.queue,
            event.job_class,
            serde_json::to_string(&event.job_args)?,
            serde_json::to_string(&event.metadata)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::JobEnvelope;
    use crate::event::EventType;
    use crate::metadata::Metadata;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    fn sample_event() -> Event {
        let item = JobEnvelope::new("TestWorker", vec![json!(1), json!(2)]).with_metadata(
            Metadata {
                event_hash: Some("abc".to_string()),
                ..Default::default()
            },
        );
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Event::new(EventType::Enqueued, timestamp, "test_queue", &item)
    }

    #[test]
    fn test_json_marshaller() {
        let line = JsonMarshaller.marshal(&sample_event()).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["event_type"], "enqueued");
        assert_eq!(value["queue"], "test_queue");
        assert_eq!(value["job_class"], "TestWorker");
        assert_eq!(value["job_args"], json!([1, 2]));
        assert_eq!(value["metadata"]["event_hash"], "abc");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_text_marshaller() {
        let line = TextMarshaller.marshal(&sample_event()).unwrap();
        assert_eq!(
            line,
            "2024-05-01T12:00:00+00:00 enqueued queue=test_queue class=TestWorker args=[1,2] metadata={\"event_hash\":\"abc\"}"
        );
    }
}
