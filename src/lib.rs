//! # cluesq
//!
//! Job lifecycle instrumentation for Rust job queues.
//!
//! cluesq decorates a queue's push/pop and a job's perform/fail with
//! correlation ids and timing metadata, and reports every lifecycle step to
//! a pluggable publisher. Results and errors of the wrapped operations are
//! never changed.
//!
//! ## Features
//!
//! - **Correlation**: every job gets an `event_hash` at enqueue that follows it
//!   through the queue and into its perform and fail events
//! - **Timing**: `time_in_queue` at dequeue and `time_to_perform` after execution
//! - **Transparent**: with no publisher configured every decorator is a pure passthrough
//! - **Pluggable publishers**: stdout/stderr, `tracing`, composite and Prometheus
//! - **Custom metadata**: an item preprocessor can attach tenant or caller ids at enqueue
//!
//! ## Quick Start
//!
//! ```rust
//! use cluesq::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> CluesResult<()> {
//!     let config = CluesConfig::new(Arc::new(StandardOutPublisher::new()))
//!         .with_preprocessor(Arc::new(|_queue: &str, item: &mut JobEnvelope| {
//!             item.ensure_metadata().insert("tenant", "acme");
//!         }));
//!
//!     let queue = InstrumentedQueue::new(InMemoryQueue::new(), config);
//!
//!     // Publishes an `enqueued` event
//!     queue.push("mailers", JobEnvelope::new("WelcomeEmail", vec![json!(42)])).await?;
//!
//!     // Publishes a `dequeued` event with the time spent waiting
//!     let item = queue.pop("mailers").await?.expect("item was just pushed");
//!     assert_eq!(item.metadata.unwrap().get("tenant"), Some(&json!("acme")));
//!     Ok(())
//! }
//! ```
//!
//! Jobs are instrumented the same way by wrapping the host's [`Job`]
//! implementation in an [`InstrumentedJob`].

pub mod config;
pub mod core;
pub mod envelope;
pub mod error;
pub mod event;
pub mod job;
pub mod metadata;
pub mod publisher;
pub mod queue;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::core::{InstrumentedJob, InstrumentedQueue};
    pub use crate::envelope::JobEnvelope;
    pub use crate::error::{CluesError, CluesResult};
    pub use crate::event::{Event, EventType, ExceptionDetails};
    pub use crate::job::Job;
    pub use crate::metadata::Metadata;
    pub use crate::publisher::{
        CompositePublisher, EventMarshaller, EventPublisher, JsonMarshaller, LogPublisher,
        StandardErrPublisher, StandardOutPublisher, StreamPublisher, TextMarshaller,
    };
    pub use crate::queue::{InMemoryQueue, QueueBackend};
    pub use async_trait::async_trait;

    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    pub use crate::queue::RedisQueue;

    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub use crate::publisher::PrometheusPublisher;
}

pub use crate::config::{CluesConfig, ItemPreprocessor, PublisherSettings};
pub use crate::core::{InstrumentedJob, InstrumentedQueue};
pub use crate::envelope::JobEnvelope;
pub use crate::error::{CluesError, CluesResult};
pub use crate::event::{Event, EventType, ExceptionDetails};
pub use crate::job::Job;
pub use crate::metadata::Metadata;
pub use crate::publisher::EventPublisher;
pub use crate::queue::{InMemoryQueue, QueueBackend};
pub use async_trait::async_trait;
