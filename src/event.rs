//! Lifecycle events handed to publishers.

use crate::envelope::JobEnvelope;
use crate::metadata::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

/// Stage of a job's lifecycle an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Job was pushed onto a queue
    Enqueued,
    /// Job was popped off a queue
    Dequeued,
    /// Job execution is about to start
    PerformStarted,
    /// Job execution completed normally
    PerformFinished,
    /// Job execution failed
    Failed,
}

impl EventType {
    /// Every event type, in lifecycle order.
    pub const ALL: [EventType; 5] = [
        EventType::Enqueued,
        EventType::Dequeued,
        EventType::PerformStarted,
        EventType::PerformFinished,
        EventType::Failed,
    ];

    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Enqueued => "enqueued",
            EventType::Dequeued => "dequeued",
            EventType::PerformStarted => "perform_started",
            EventType::PerformFinished => "perform_finished",
            EventType::Failed => "failed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lifecycle event.
///
/// Events are built by the decorators, passed to the configured publisher and
/// dropped. They are never stored by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What happened
    pub event_type: EventType,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Queue the job belongs to
    pub queue: String,
    /// Snapshot of the job metadata at this stage
    pub metadata: Metadata,
    /// Job class name
    pub job_class: String,
    /// Job arguments
    pub job_args: Vec<Value>,
}

impl Event {
    /// Build an event from the current state of a job envelope.
    pub fn new(
        event_type: EventType,
        timestamp: DateTime<Utc>,
        queue: impl Into<String>,
        item: &JobEnvelope,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            queue: queue.into(),
            metadata: item.metadata.clone().unwrap_or_default(),
            job_class: item.class.clone(),
            job_args: item.args.clone(),
        }
    }
}

/// Description of the error a job failed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDetails {
    /// Type name of the error
    pub class: String,
    /// Display form of the error
    pub message: String,
    /// Backtrace lines, outermost first
    pub backtrace: Vec<String>,
}

impl ExceptionDetails {
    /// Describe an error from its type, message and `source()` chain.
    ///
    /// Each cause in the chain becomes one backtrace line, so an error with
    /// no source yields an empty backtrace.
    pub fn capture<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut backtrace = Vec::new();
        let mut cause = error.source();
        while let Some(err) = cause {
            backtrace.push(format!("caused by: {}", err));
            cause = err.source();
        }

        Self {
            class: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            backtrace,
        }
    }

    /// Replace the backtrace with the frames of a captured [`Backtrace`].
    ///
    /// Backtraces that were not captured (disabled or unsupported) leave the
    /// existing lines in place.
    pub fn with_backtrace(mut self, backtrace: &Backtrace) -> Self {
        if backtrace.status() == BacktraceStatus::Captured {
            self.backtrace = backtrace
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
        }
        self
    }

    /// Write the exception fields onto job metadata.
    pub fn apply_to(self, metadata: &mut Metadata) {
        metadata.exception_class = Some(self.class);
        metadata.exception_message = Some(self.message);
        metadata.exception_backtrace = Some(self.backtrace);
    }
}
