//! Metadata attached to a job envelope and the correlation helpers that fill it.
//!
//! Metadata accumulates as a job moves through its lifecycle: the enqueue
//! stamp writes `event_hash`, `hostname`, `process` and `enqueued_time`, the
//! dequeue stamp adds `time_in_queue`, and the job decorator adds
//! `time_to_perform` and, on failure, the exception fields. A field written
//! by an earlier stage is never removed by a later one.
//!
//! Keys injected by an [`ItemPreprocessor`](crate::config::ItemPreprocessor)
//! live in [`Metadata::extra`] and serialize inline with the known fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle metadata carried inside a [`JobEnvelope`](crate::envelope::JobEnvelope).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Correlation id shared by every event of one job instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_hash: Option<String>,

    /// Host that performed the most recent lifecycle step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Process id that performed the most recent lifecycle step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<u32>,

    /// When the job entered the queue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueued_time: Option<DateTime<Utc>>,

    /// Time spent between enqueue and dequeue
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "duration_secs"
    )]
    pub time_in_queue: Option<Duration>,

    /// Time spent executing the job
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "duration_secs"
    )]
    pub time_to_perform: Option<Duration>,

    /// Type name of the error a failed job raised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_class: Option<String>,

    /// Message of the error a failed job raised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,

    /// Backtrace lines of the error a failed job raised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_backtrace: Option<Vec<String>>,

    /// Custom keys added by an item preprocessor
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// Create an empty metadata mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the correlation id, generating one if none was assigned yet.
    ///
    /// An existing `event_hash` is never replaced.
    pub fn ensure_event_hash(&mut self) -> &str {
        self.event_hash.get_or_insert_with(generate_event_hash)
    }

    /// Record the current host name and process id.
    pub fn stamp_origin(&mut self) {
        self.hostname = Some(current_hostname().to_string());
        self.process = Some(current_process());
    }

    /// Look up a custom key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Insert a custom key, returning the previous value if any.
    ///
    /// A key naming one of the lifecycle fields (see [`RESERVED_KEYS`]) is
    /// written to that field instead of [`Metadata::extra`] and returns `None`.
    /// A value of the wrong type for the field is dropped.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if is_reserved(&key) {
            self.assign_field(&key, value);
            return None;
        }
        self.extra.insert(key, value)
    }

    /// Move lifecycle field names out of [`Metadata::extra`] into their fields.
    ///
    /// Such keys would otherwise serialize twice and make the envelope
    /// unreadable.
    pub fn absorb_reserved(&mut self) {
        for key in RESERVED_KEYS {
            if let Some(value) = self.extra.remove(*key) {
                self.assign_field(key, value);
            }
        }
    }

    fn assign_field(&mut self, key: &str, value: Value) {
        let mut fields = Map::new();
        fields.insert(key.to_string(), value);

        let parsed = match serde_json::from_value::<Metadata>(Value::Object(fields)) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Dropping metadata key {} with invalid value: {}", key, e);
                return;
            }
        };

        match key {
            "event_hash" => self.event_hash = parsed.event_hash,
            "hostname" => self.hostname = parsed.hostname,
            "process" => self.process = parsed.process,
            "enqueued_time" => self.enqueued_time = parsed.enqueued_time,
            "time_in_queue" => self.time_in_queue = parsed.time_in_queue,
            "time_to_perform" => self.time_to_perform = parsed.time_to_perform,
            "exception_class" => self.exception_class = parsed.exception_class,
            "exception_message" => self.exception_message = parsed.exception_message,
            "exception_backtrace" => self.exception_backtrace = parsed.exception_backtrace,
            _ => {}
        }
    }

    /// Builder-style variant of [`Metadata::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }
}

/// Keys owned by the lifecycle fields of [`Metadata`].
pub const RESERVED_KEYS: &[&str] = &[
    "event_hash",
    "hostname",
    "process",
    "enqueued_time",
    "time_in_queue",
    "time_to_perform",
    "exception_class",
    "exception_message",
    "exception_backtrace",
];

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Generate a fresh correlation id.
pub fn generate_event_hash() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Name of the current host, resolved once per process.
pub fn current_hostname() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    })
}

/// Id of the current process.
pub fn current_process() -> u32 {
    std::process::id()
}

/// Elapsed time from `start` to `now`, clamped at zero.
///
/// Enqueue and dequeue usually run on different hosts, so a skewed clock can
/// put `start` after `now`.
pub fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - start).to_std().unwrap_or(Duration::ZERO)
}

/// Serde adapter storing durations as fractional seconds.
mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}
