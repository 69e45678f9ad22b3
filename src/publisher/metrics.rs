//! Prometheus publisher turning lifecycle events into metrics.

use super::EventPublisher;
use crate::error::{CluesError, CluesResult};
use crate::event::{Event, EventType};
use async_trait::async_trait;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

const TIMING_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
];

/// Publisher recording event counts and job timings in a Prometheus registry.
///
/// - `cluesq_events_total{event_type, queue}` counts every event
/// - `cluesq_time_in_queue_seconds{queue}` observes `time_in_queue` on dequeue
/// - `cluesq_time_to_perform_seconds{queue, job_class, outcome}` observes
///   `time_to_perform` on finish and failure
pub struct PrometheusPublisher {
    registry: Registry,
    events_total: IntCounterVec,
    time_in_queue: HistogramVec,
    time_to_perform: HistogramVec,
}

impl std::fmt::Debug for PrometheusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusPublisher").finish_non_exhaustive()
    }
}

fn metrics_error(what: &str, e: prometheus::Error) -> CluesError {
    CluesError::config(format!("Failed to create {} metric: {}", what, e))
}

impl PrometheusPublisher {
    /// Create a publisher with its own registry.
    pub fn new() -> CluesResult<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create a publisher registering its metrics in `registry`.
    pub fn with_registry(registry: Registry) -> CluesResult<Self> {
        let events_total = IntCounterVec::new(
            Opts::new("cluesq_events_total", "Total number of job lifecycle events"),
            &["event_type", "queue"],
        )
        .map_err(|e| metrics_error("events_total", e))?;

        let time_in_queue = HistogramVec::new(
            HistogramOpts::new(
                "cluesq_time_in_queue_seconds",
                "Time jobs spent waiting in a queue",
            )
            .buckets(TIMING_BUCKETS.to_vec()),
            &["queue"],
        )
        .map_err(|e| metrics_error("time_in_queue", e))?;

        let time_to_perform = HistogramVec::new(
            HistogramOpts::new(
                "cluesq_time_to_perform_seconds",
                "Time jobs spent executing",
            )
            .buckets(TIMING_BUCKETS.to_vec()),
            &["queue", "job_class", "outcome"],
        )
        .map_err(|e| metrics_error("time_to_perform", e))?;

        registry
            .register(Box::new(events_total.clone()))
            .map_err(|e| metrics_error("events_total", e))?;
        registry
            .register(Box::new(time_in_queue.clone()))
            .map_err(|e| metrics_error("time_in_queue", e))?;
        registry
            .register(Box::new(time_to_perform.clone()))
            .map_err(|e| metrics_error("time_to_perform", e))?;

        Ok(Self {
            registry,
            events_total,
            time_in_queue,
            time_to_perform,
        })
    }

    /// Registry holding this publisher's metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn gather_text(&self) -> CluesResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| CluesError::publish("prometheus", format!("failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| CluesError::publish_with("prometheus", "metrics are not valid UTF-8", e))
    }
}

#[async_trait]
impl EventPublisher for PrometheusPublisher {
    async fn publish(&self, event: &Event) -> CluesResult<()> {
        self.events_total
            .with_label_values(&[event.event_type.as_str(), event.queue.as_str()])
            .inc();

        match event.event_type {
            EventType::Dequeued => {
                if let Some(waited) = event.metadata.time_in_queue {
                    self.time_in_queue
                        .with_label_values(&[event.queue.as_str()])
                        .observe(waited.as_secs_f64());
                }
            }
            EventType::PerformFinished | EventType::Failed => {
                let outcome = if event.event_type == EventType::Failed {
                    "failed"
                } else {
                    "finished"
                };
                if let Some(took) = event.metadata.time_to_perform {
                    self.time_to_perform
                        .with_label_values(&[event.queue.as_str(), event.job_class.as_str(), outcome])
                        .observe(took.as_secs_f64());
                }
            }
            EventType::Enqueued | EventType::PerformStarted => {}
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}
