//! Line-oriented publishers writing to a stream.
//!
//! Every event becomes exactly one line, written and flushed before
//! `publish` returns. Nothing is buffered or batched.

use super::{EventMarshaller, EventPublisher, JsonMarshaller, TextMarshaller};
use crate::error::{CluesError, CluesResult};
use crate::event::Event;
use async_trait::async_trait;
use std::io::{Stderr, Stdout, Write};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Publisher writing one marshalled line per event to any writer.
pub struct StreamPublisher<W> {
    writer: Mutex<W>,
    marshaller: Arc<dyn EventMarshaller>,
    name: String,
}

impl<W> std::fmt::Debug for StreamPublisher<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPublisher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> StreamPublisher<W> {
    /// Create a publisher writing JSON lines to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            marshaller: Arc::new(JsonMarshaller),
            name: "stream".to_string(),
        }
    }

    /// Use a different line format.
    pub fn with_marshaller(mut self, marshaller: Arc<dyn EventMarshaller>) -> Self {
        self.marshaller = marshaller;
        self
    }

    /// Set the name reported in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Consume the publisher and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn render(&self, event: &Event) -> CluesResult<String> {
        self.marshaller.marshal(event)
    }
}

#[async_trait]
impl<W: Write + Send> EventPublisher for StreamPublisher<W> {
    async fn publish(&self, event: &Event) -> CluesResult<()> {
        let line = self.render(event)?;
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| CluesError::publish_with(&self.name, "failed to write event", e))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Publisher writing events to standard output.
#[derive(Debug)]
pub struct StandardOutPublisher {
    stream: StreamPublisher<Stdout>,
}

impl StandardOutPublisher {
    /// Create a stdout publisher writing human readable text lines.
    pub fn new() -> Self {
        Self {
            stream: StreamPublisher::new(std::io::stdout())
                .with_marshaller(Arc::new(TextMarshaller))
                .with_name("stdout"),
        }
    }

    /// Use a different line format.
    pub fn with_marshaller(self, marshaller: Arc<dyn EventMarshaller>) -> Self {
        Self {
            stream: self.stream.with_marshaller(marshaller),
        }
    }
}

impl Default for StandardOutPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for StandardOutPublisher {
    async fn publish(&self, event: &Event) -> CluesResult<()> {
        self.stream.publish(event).await
    }

    fn name(&self) -> &str {
        self.stream.name()
    }
}

/// Publisher writing events to standard error.
#[derive(Debug)]
pub struct StandardErrPublisher {
    stream: StreamPublisher<Stderr>,
}

impl StandardErrPublisher {
    /// Create a stderr publisher writing human readable text lines.
    pub fn new() -> Self {
        Self {
            stream: StreamPublisher::new(std::io::stderr())
                .with_marshaller(Arc::new(TextMarshaller))
                .with_name("stderr"),
        }
    }

    /// Use a different line format.
    pub fn with_marshaller(self, marshaller: Arc<dyn EventMarshaller>) -> Self {
        Self {
            stream: self.stream.with_marshaller(marshaller),
        }
    }
}

impl Default for StandardErrPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for StandardErrPublisher {
    async fn publish(&self, event: &Event) -> CluesResult<()> {
        self.stream.publish(event).await
    }

    fn name(&self) -> &str {
        self.stream.name()
    }
}
