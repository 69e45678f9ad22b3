use cluesq::prelude::*;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct DeliveryError(String);

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery failed: {}", self.0)
    }
}

impl std::error::Error for DeliveryError {}

struct SendEmail {
    queue: String,
    payload: JobEnvelope,
}

#[async_trait]
impl Job for SendEmail {
    type Output = ();
    type Error = DeliveryError;
    type FailOutput = ();

    fn queue(&self) -> &str {
        &self.queue
    }

    fn payload(&self) -> &JobEnvelope {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut JobEnvelope {
        &mut self.payload
    }

    async fn perform(&mut self) -> Result<(), DeliveryError> {
        match self.payload.args.first().and_then(|a| a.as_str()) {
            Some(address) if address.contains('@') => Ok(()),
            other => Err(DeliveryError(format!("bad address {:?}", other))),
        }
    }

    async fn fail(&mut self, error: DeliveryError) {
        eprintln!("job gave up: {}", error);
    }
}

#[tokio::main]
async fn main() -> CluesResult<()> {
    tracing_subscriber::fmt::init();

    // Events go to stdout as JSON lines, and through tracing as well
    let settings: PublisherSettings = serde_json::from_value(json!({
        "type": "composite",
        "publishers": [
            { "type": "stdout", "format": "json" },
            { "type": "log", "level": "info" }
        ]
    }))?;
    let config = settings
        .build()?
        .with_preprocessor(Arc::new(|queue: &str, item: &mut JobEnvelope| {
            item.ensure_metadata().insert("origin_queue", queue);
        }));

    let queue = InstrumentedQueue::new(InMemoryQueue::new(), config.clone());
    queue
        .push("mailers", JobEnvelope::new("SendEmail", vec![json!("ada@example.com")]))
        .await?;
    queue
        .push("mailers", JobEnvelope::new("SendEmail", vec![json!("nobody")]))
        .await?;

    while let Some(item) = queue.pop("mailers").await? {
        let job = SendEmail {
            queue: "mailers".to_string(),
            payload: item,
        };
        let mut job = InstrumentedJob::new(job, config.clone());
        if let Err(e) = job.perform().await {
            job.fail(e).await;
        }
    }

    Ok(())
}
