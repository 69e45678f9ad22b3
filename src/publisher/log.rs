//! Publisher emitting events as structured `tracing` records.

use super::EventPublisher;
use crate::config::LogLevel;
use crate::error::CluesResult;
use crate::event::Event;
use async_trait::async_trait;
use tracing::Level;

/// Target used for every record this publisher emits.
pub const EVENT_TARGET: &str = "cluesq::events";

macro_rules! log_event {
    ($level:expr, $event:ident, $metadata:ident) => {
        tracing::event!(
            target: EVENT_TARGET,
            $level,
            event_type = %$event.event_type,
            queue = %$event.queue,
            job_class = %$event.job_class,
            event_hash = $event.metadata.event_hash.as_deref().unwrap_or(""),
            timestamp = %$event.timestamp.to_rfc3339(),
            metadata = %$metadata,
            "job {}", $event.event_type
        )
    };
}

/// Publisher handing events to the application's `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    level: Level,
}

impl LogPublisher {
    /// Create a publisher logging at the given level.
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: level.into(),
        }
    }

    /// Level records are emitted at.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LogPublisher {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &Event) -> CluesResult<()> {
        let metadata = serde_json::to_string(&event.metadata)?;
        match self.level {
            Level::TRACE => log_event!(Level::TRACE, event, metadata),
            Level::DEBUG => log_event!(Level::DEBUG, event, metadata),
            Level::INFO => log_event!(Level::INFO, event, metadata),
            Level::WARN => log_event!(Level::WARN, event, metadata),
            _ => log_event!(Level::ERROR, event, metadata),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
