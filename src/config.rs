//! Configuration types for cluesq.
//!
//! [`CluesConfig`] is the runtime configuration injected into the queue and
//! job decorators: the active publisher (or none, which disables all
//! instrumentation) and an optional item preprocessor. It is built once at
//! startup, either directly or from serializable [`PublisherSettings`].
//!
//! [`QueueConfig`] configures the reference queue backends.

use crate::envelope::JobEnvelope;
use crate::error::{CluesError, CluesResult};
use crate::publisher::{
    CompositePublisher, EventMarshaller, EventPublisher, JsonMarshaller, LogPublisher,
    StandardErrPublisher, StandardOutPublisher, TextMarshaller,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Hook run on every enqueued item before the `enqueued` event is published.
///
/// Use it to attach custom metadata such as tenant or caller ids:
///
/// ```rust
/// use cluesq::prelude::*;
/// use std::sync::Arc;
///
/// let config = CluesConfig::disabled()
///     .with_preprocessor(Arc::new(|_queue: &str, item: &mut JobEnvelope| {
///         item.ensure_metadata().insert("employer_id", 1);
///     }));
/// assert!(config.preprocessor.is_some());
/// ```
pub trait ItemPreprocessor: Send + Sync {
    /// Mutate the item in place.
    fn mutate(&self, queue: &str, item: &mut JobEnvelope);
}

impl<F> ItemPreprocessor for F
where
    F: Fn(&str, &mut JobEnvelope) + Send + Sync,
{
    fn mutate(&self, queue: &str, item: &mut JobEnvelope) {
        self(queue, item)
    }
}

/// Runtime configuration shared by the decorators.
///
/// # Examples
///
/// ```rust
/// use cluesq::prelude::*;
/// use std::sync::Arc;
///
/// // Instrumentation off: decorators are pure passthroughs
/// let config = CluesConfig::disabled();
/// assert!(!config.is_enabled());
///
/// // Publish lifecycle events to stdout
/// let config = CluesConfig::disabled()
///     .with_publisher(Arc::new(StandardOutPublisher::new()));
/// assert!(config.is_enabled());
/// ```
#[derive(Clone, Default)]
pub struct CluesConfig {
    /// Active publisher; `None` disables instrumentation entirely
    pub publisher: Option<Arc<dyn EventPublisher>>,

    /// Optional hook mutating items before they are enqueued
    pub preprocessor: Option<Arc<dyn ItemPreprocessor>>,
}

impl std::fmt::Debug for CluesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CluesConfig")
            .field("publisher", &self.publisher.as_ref().map(|p| p.name()))
            .field("preprocessor", &self.preprocessor.is_some())
            .finish()
    }
}

impl CluesConfig {
    /// Configuration with instrumentation disabled.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Configuration publishing to `publisher`.
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self::disabled().with_publisher(publisher)
    }

    /// Set the publisher.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Set the item preprocessor.
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn ItemPreprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Whether a publisher is configured.
    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    /// Reset to the disabled state.
    pub fn clear(&mut self) {
        self.publisher = None;
        self.preprocessor = None;
    }
}

/// Line format used by stream publishers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarshalFormat {
    /// One JSON object per line
    Json,
    /// Human readable `key=value` text
    #[default]
    Text,
}

impl MarshalFormat {
    fn marshaller(self) -> Arc<dyn EventMarshaller> {
        match self {
            MarshalFormat::Json => Arc::new(JsonMarshaller),
            MarshalFormat::Text => Arc::new(TextMarshaller),
        }
    }
}

/// Serializable description of which publisher to build.
///
/// ```rust
/// use cluesq::config::PublisherSettings;
///
/// let settings: PublisherSettings =
///     serde_json::from_str(r#"{"type": "stdout", "format": "text"}"#).unwrap();
/// assert!(settings.build().unwrap().is_enabled());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublisherSettings {
    /// No publisher: instrumentation off
    #[default]
    Disabled,

    /// Write events to standard output
    Stdout {
        /// Line format
        #[serde(default)]
        format: MarshalFormat,
    },

    /// Write events to standard error
    Stderr {
        /// Line format
        #[serde(default)]
        format: MarshalFormat,
    },

    /// Emit events as `tracing` records
    Log {
        /// Level records are emitted at
        #[serde(default)]
        level: LogLevel,
    },

    /// Deliver events to several publishers
    Composite {
        /// Child publishers
        publishers: Vec<PublisherSettings>,
    },
}

impl PublisherSettings {
    /// Build the publisher described by these settings, `None` when disabled.
    pub fn build_publisher(&self) -> CluesResult<Option<Arc<dyn EventPublisher>>> {
        let publisher: Arc<dyn EventPublisher> = match self {
            PublisherSettings::Disabled => return Ok(None),
            PublisherSettings::Stdout { format } => {
                Arc::new(StandardOutPublisher::new().with_marshaller(format.marshaller()))
            }
            PublisherSettings::Stderr { format } => {
                Arc::new(StandardErrPublisher::new().with_marshaller(format.marshaller()))
            }
            PublisherSettings::Log { level } => Arc::new(LogPublisher::new(*level)),
            PublisherSettings::Composite { publishers } => {
                let mut composite = CompositePublisher::new();
                for child in publishers {
                    if let Some(publisher) = child.build_publisher()? {
                        composite.push(publisher);
                    }
                }
                // Disabled children are skipped, so check what is left
                if composite.is_empty() {
                    return Err(CluesError::config(
                        "Composite publisher needs at least one enabled child",
                    ));
                }
                Arc::new(composite)
            }
        };
        Ok(Some(publisher))
    }

    /// Build a [`CluesConfig`] from these settings.
    pub fn build(&self) -> CluesResult<CluesConfig> {
        Ok(CluesConfig {
            publisher: self.build_publisher()?,
            preprocessor: None,
        })
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Configuration for the reference queue backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Prefix for storage keys
    pub key_prefix: String,

    /// Timeout for connecting to and operating on a remote queue (in seconds)
    pub operation_timeout_secs: u64,

    /// Redis backend configuration
    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    pub redis: Option<RedisConfig>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key_prefix: "resque".to_string(),
            operation_timeout_secs: 10,
            #[cfg(feature = "redis-queue")]
            redis: None,
        }
    }
}

impl QueueConfig {
    /// Create configuration for a Redis queue.
    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    pub fn redis(connection_string: String) -> Self {
        Self {
            redis: Some(RedisConfig {
                connection_string,
                db: 0,
            }),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the operation timeout.
    pub fn with_operation_timeout(mut self, timeout_secs: u64) -> Self {
        self.operation_timeout_secs = timeout_secs;
        self
    }

    /// Operation timeout as a [`Duration`].
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.key_prefix.trim().is_empty() {
            errors.push("Key prefix must not be empty".to_string());
        }

        if self.operation_timeout_secs == 0 {
            errors.push("Operation timeout must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate the configuration, folding any errors into a [`CluesError`].
    pub fn validated(self) -> CluesResult<Self> {
        self.validate()
            .map_err(|errors| CluesError::config(errors.join("; ")))?;
        Ok(self)
    }
}

/// Redis queue configuration.
#[cfg(feature = "redis-queue")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    pub connection_string: String,

    /// Redis database number
    pub db: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_disabled() {
        let config = CluesConfig::default();
        assert!(!config.is_enabled());
        assert!(config.preprocessor.is_none());
    }

    #[test]
    fn test_clear_disables() {
        let mut config = CluesConfig::new(Arc::new(StandardOutPublisher::new()))
            .with_preprocessor(Arc::new(|_: &str, _: &mut JobEnvelope| {}));
        assert!(config.is_enabled());

        config.clear();
        assert!(!config.is_enabled());
        assert!(config.preprocessor.is_none());
    }

    #[test]
    fn test_closure_preprocessor() {
        let preprocessor: Arc<dyn ItemPreprocessor> =
            Arc::new(|queue: &str, item: &mut JobEnvelope| {
                item.ensure_metadata().insert("queue_seen", queue);
            });

        let mut item = JobEnvelope::new("TestWorker", vec![]);
        preprocessor.mutate("mailers", &mut item);

        let metadata = item.metadata.unwrap();
        assert_eq!(metadata.get("queue_seen"), Some(&serde_json::json!("mailers")));
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: PublisherSettings = toml::from_str(
            r#"
            type = "composite"

            [[publishers]]
            type = "stdout"
            format = "text"

            [[publishers]]
            type = "log"
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings,
            PublisherSettings::Composite {
                publishers: vec![
                    PublisherSettings::Stdout {
                        format: MarshalFormat::Text
                    },
                    PublisherSettings::Log {
                        level: LogLevel::Debug
                    },
                ]
            }
        );

        let config = settings.build().unwrap();
        assert_eq!(config.publisher.unwrap().name(), "composite");
    }

    #[test]
    fn test_settings_build() {
        assert!(!PublisherSettings::Disabled.build().unwrap().is_enabled());

        let stderr = PublisherSettings::Stderr {
            format: MarshalFormat::Json,
        };
        assert_eq!(stderr.build_publisher().unwrap().unwrap().name(), "stderr");

        let empty = PublisherSettings::Composite { publishers: vec![] };
        assert!(matches!(
            empty.build(),
            Err(CluesError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_composite_of_disabled_children_is_rejected() {
        let settings: PublisherSettings = toml::from_str(
            r#"
            type = "composite"

            [[publishers]]
            type = "disabled"
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.build(),
            Err(CluesError::ConfigError { .. })
        ));

        let mixed = PublisherSettings::Composite {
            publishers: vec![PublisherSettings::Disabled, PublisherSettings::Log {
                level: LogLevel::Debug,
            }],
        };
        assert!(mixed.build().unwrap().is_enabled());
    }

    #[test]
    fn test_settings_defaults() {
        let settings: PublisherSettings = serde_json::from_str(r#"{"type": "log"}"#).unwrap();
        assert_eq!(
            settings,
            PublisherSettings::Log {
                level: LogLevel::Info
            }
        );

        let settings: PublisherSettings = serde_json::from_str(r#"{"type": "stdout"}"#).unwrap();
        assert_eq!(
            settings,
            PublisherSettings::Stdout {
                format: MarshalFormat::Text
            }
        );
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
        assert_eq!(tracing::Level::from(LogLevel::Trace), tracing::Level::TRACE);
    }

    #[test]
    fn test_queue_config_validation() {
        let config = QueueConfig::default();
        assert_eq!(config.key_prefix, "resque");
        assert!(config.validate().is_ok());

        let config = QueueConfig::default()
            .with_key_prefix(" ")
            .with_operation_timeout(0);
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("prefix")));
    }

    #[test]
    fn test_validated_reports_config_error() {
        assert!(QueueConfig::default().validated().is_ok());

        let err = QueueConfig::default()
            .with_operation_timeout(0)
            .validated()
            .unwrap_err();
        assert!(matches!(err, CluesError::ConfigError { .. }));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_operation_timeout() {
        let config = QueueConfig::default().with_operation_timeout(3);
        assert_eq!(config.operation_timeout(), Duration::from_secs(3));
    }
}
