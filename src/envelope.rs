//! The job envelope: the serialized unit of work handed to a queue.

use crate::error::CluesResult;
use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A job as it travels through a queue.
///
/// The envelope round-trips through the host queue unchanged, except for
/// metadata added by the instrumentation layer. `metadata` is absent when the
/// job was enqueued without instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Name of the job class the host resolves at perform time
    pub class: String,
    /// Positional job arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Lifecycle metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl JobEnvelope {
    /// Create an envelope without metadata.
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            args,
            metadata: None,
        }
    }

    /// Attach metadata to the envelope.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether the envelope carries metadata.
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Return the metadata, creating an empty mapping if absent.
    pub fn ensure_metadata(&mut self) -> &mut Metadata {
        self.metadata.get_or_insert_with(Metadata::default)
    }

    /// Serialize the envelope for storage in a queue.
    pub fn to_json(&self) -> CluesResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize an envelope read back from a queue.
    pub fn from_json(data: &str) -> CluesResult<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_without_metadata_omits_key() {
        let item = JobEnvelope::new("TestWorker", vec![json!(1), json!(2)]);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({"class": "TestWorker", "args": [1, 2]}));
    }

    #[test]
    fn test_envelope_from_host_payload() {
        let item = JobEnvelope::from_json(r#"{"class":"TestWorker","args":[1,2],"metadata":{}}"#)
            .unwrap();
        assert_eq!(item.class, "TestWorker");
        assert_eq!(item.args, vec![json!(1), json!(2)]);
        assert_eq!(item.metadata, Some(Metadata::new()));
    }

    #[test]
    fn test_missing_args_default_to_empty() {
        let item = JobEnvelope::from_json(r#"{"class":"Cleanup"}"#).unwrap();
        assert!(item.args.is_empty());
        assert!(!item.has_metadata());
    }

    #[test]
    fn test_ensure_metadata_keeps_existing() {
        let mut item = JobEnvelope::new("TestWorker", vec![])
            .with_metadata(Metadata::new().with("employer_id", 7));
        item.ensure_metadata().insert("tenant", "acme");

        let metadata = item.metadata.unwrap();
        assert_eq!(metadata.get("employer_id"), Some(&json!(7)));
        assert_eq!(metadata.get("tenant"), Some(&json!("acme")));
    }
}
