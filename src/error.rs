//! Error types for cluesq operations.

use thiserror::Error;

/// Result type used throughout cluesq.
pub type CluesResult<T> = Result<T, CluesError>;

/// Main error type for cluesq operations.
///
/// Note that errors raised by a host job are never converted into this type:
/// they flow through the job decorator untouched.
#[derive(Error, Debug)]
pub enum CluesError {
    /// A publisher could not deliver an event
    #[error("Publisher '{publisher}' failed: {message}")]
    PublishFailed {
        /// Name of the publisher that failed
        publisher: String,
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Queue backend error
    #[error("Queue error: {message}")]
    QueueError {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error while writing events
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// Redis connection error
    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl CluesError {
    /// Create a new publish error
    pub fn publish(publisher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishFailed {
            publisher: publisher.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new publish error wrapping its cause
    pub fn publish_with<E>(publisher: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::PublishFailed {
            publisher: publisher.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new queue error
    pub fn queue<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::QueueError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_display() {
        let err = CluesError::publish("stdout", "pipe closed");
        assert_eq!(err.to_string(), "Publisher 'stdout' failed: pipe closed");
    }

    #[test]
    fn test_queue_error_keeps_source() {
        let io = std::io::Error::other("connection reset");
        let err = CluesError::queue("push rejected", io);
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert_eq!(source.to_string(), "connection reset");
    }
}
