//! The instrumentation layer: queue and job decorators.
//!
//! Both decorators take a [`CluesConfig`] at construction and wrap a host
//! implementation, exposing the same trait they wrap. With no publisher
//! configured they are pure passthroughs. With one, they stamp metadata on
//! the job envelope and publish one event per lifecycle step:
//!
//! ```text
//! push ──► enqueued ─► (queue) ─► pop ──► dequeued
//!                                         perform ──► perform_started ─► perform_finished
//!                                         fail ─────► failed
//! ```
//!
//! Events are published inline. A publisher error is logged and dropped so
//! that an observability outage never changes what the host sees.

use crate::config::CluesConfig;
use crate::event::Event;

pub mod job_decorator;
pub mod queue_decorator;

pub use job_decorator::InstrumentedJob;
pub use queue_decorator::InstrumentedQueue;

/// Hand an event to the configured publisher, isolating any failure.
pub(crate) async fn publish(config: &CluesConfig, event: Event) {
    let Some(publisher) = config.publisher.as_ref() else {
        return;
    };

    match publisher.publish(&event).await {
        Ok(()) => tracing::trace!(
            "Published {} event for {} on {}",
            event.event_type,
            event.job_class,
            event.queue
        ),
        Err(e) => tracing::warn!(
            publisher = publisher.name(),
            event_type = %event.event_type,
            queue = %event.queue,
            "Failed to publish job event: {}",
            e
        ),
    }
}
