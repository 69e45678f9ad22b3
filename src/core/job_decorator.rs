//! Job decorator instrumenting perform and fail.

use super::publish;
use crate::config::CluesConfig;
use crate::envelope::JobEnvelope;
use crate::event::{Event, EventType, ExceptionDetails};
use crate::job::Job;
use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};

/// A [`Job`] wrapping a host job with lifecycle instrumentation.
///
/// `perform` publishes `perform_started` before and `perform_finished`
/// after a successful run, recording `time_to_perform`. A failed run is
/// returned untouched: reporting it is the job of `fail`, which records the
/// exception details, publishes `failed` and then hands the original error
/// to the host.
///
/// Jobs whose payload carries no metadata were enqueued without
/// instrumentation and pass straight through, as does every job when no
/// publisher is configured.
#[derive(Debug)]
pub struct InstrumentedJob<J> {
    inner: J,
    config: CluesConfig,
    perform_started: Option<Instant>,
}

impl<J: Job> InstrumentedJob<J> {
    /// Wrap `inner` using `config`.
    pub fn new(inner: J, config: CluesConfig) -> Self {
        Self {
            inner,
            config,
            perform_started: None,
        }
    }

    /// The undecorated perform operation.
    pub async fn base_perform(&mut self) -> Result<J::Output, J::Error> {
        self.inner.perform().await
    }

    /// The undecorated fail operation.
    pub async fn base_fail(&mut self, error: J::Error) -> J::FailOutput {
        self.inner.fail(error).await
    }

    /// The wrapped job.
    pub fn inner(&self) -> &J {
        &self.inner
    }

    /// Unwrap the decorator.
    pub fn into_inner(self) -> J {
        self.inner
    }

    fn is_instrumented(&self) -> bool {
        self.config.is_enabled() && self.inner.payload().has_metadata()
    }

    fn event(&self, event_type: EventType, timestamp: chrono::DateTime<Utc>) -> Event {
        Event::new(event_type, timestamp, self.inner.queue(), self.inner.payload())
    }
}

#[async_trait]
impl<J: Job> Job for InstrumentedJob<J> {
    type Output = J::Output;
    type Error = J::Error;
    type FailOutput = J::FailOutput;

    fn queue(&self) -> &str {
        self.inner.queue()
    }

    fn payload(&self) -> &JobEnvelope {
        self.inner.payload()
    }

    fn payload_mut(&mut self) -> &mut JobEnvelope {
        self.inner.payload_mut()
    }

    async fn perform(&mut self) -> Result<Self::Output, Self::Error> {
        if !self.is_instrumented() {
            return self.base_perform().await;
        }

        let started_at = Utc::now();
        let started = Instant::now();
        self.perform_started = Some(started);
        self.inner.payload_mut().ensure_metadata().stamp_origin();

        publish(&self.config, self.event(EventType::PerformStarted, started_at)).await;

        let result = self.base_perform().await;

        if result.is_ok() {
            let took = started.elapsed();
            self.inner.payload_mut().ensure_metadata().time_to_perform = Some(took);
            tracing::debug!(
                "{} on {} performed in {:?}",
                self.inner.payload().class,
                self.inner.queue(),
                took
            );
            publish(&self.config, self.event(EventType::PerformFinished, Utc::now())).await;
        }

        result
    }

    async fn fail(&mut self, error: Self::Error) -> Self::FailOutput {
        if !self.is_instrumented() {
            return self.base_fail(error).await;
        }

        let details = J::describe_failure(&error);
        // Zero when the job failed before perform ever started.
        let took = self
            .perform_started
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO);

        let metadata = self.inner.payload_mut().ensure_metadata();
        metadata.time_to_perform = Some(took);
        metadata.stamp_origin();
        details.apply_to(metadata);

        tracing::debug!(
            "{} on {} failed after {:?}: {}",
            self.inner.payload().class,
            self.inner.queue(),
            took,
            error
        );
        publish(&self.config, self.event(EventType::Failed, Utc::now())).await;

        self.base_fail(error).await
    }

    fn describe_failure(error: &Self::Error) -> ExceptionDetails {
        J::describe_failure(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{FailingPublisher, RecordingPublisher};
    use crate::metadata::Metadata;
    use serde_json::json;
    use std::backtrace::Backtrace;
    use std::fmt;
    use std::sync::Arc;

    #[derive(Debug)]
    struct WorkerError {
        message: String,
        trace: Option<Backtrace>,
    }

    impl fmt::Display for WorkerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl std::error::Error for WorkerError {}

    impl WorkerError {
        fn new(message: &str) -> Self {
            Self {
                message: message.to_string(),
                trace: None,
            }
        }

        fn raised(message: &str) -> Self {
            Self {
                message: message.to_string(),
                trace: Some(Backtrace::force_capture()),
            }
        }
    }

    /// Host job scripted by each test.
    #[derive(Debug)]
    struct TestJob {
        queue: String,
        payload: JobEnvelope,
        outcome: Option<Result<u32, WorkerError>>,
        performed: usize,
        failures: Vec<String>,
    }

    impl TestJob {
        fn new(payload: JobEnvelope) -> Self {
            Self {
                queue: "test_queue".to_string(),
                payload,
                outcome: Some(Ok(42)),
                performed: 0,
                failures: Vec::new(),
            }
        }

        fn failing_with(mut self, error: WorkerError) -> Self {
            self.outcome = Some(Err(error));
            self
        }
    }

    #[async_trait]
    impl Job for TestJob {
        type Output = u32;
        type Error = WorkerError;
        type FailOutput = &'static str;

        fn queue(&self) -> &str {
            &self.queue
        }

        fn payload(&self) -> &JobEnvelope {
            &self.payload
        }

        fn payload_mut(&mut self) -> &mut JobEnvelope {
            &mut self.payload
        }

        async fn perform(&mut self) -> Result<u32, WorkerError> {
            self.performed += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.outcome.take().unwrap_or(Ok(0))
        }

        async fn fail(&mut self, error: WorkerError) -> &'static str {
            self.failures.push(error.message);
            "failure recorded"
        }

        fn describe_failure(error: &WorkerError) -> ExceptionDetails {
            let details = ExceptionDetails::capture(error);
            match &error.trace {
                Some(backtrace) => details.with_backtrace(backtrace),
                None => details,
            }
        }
    }

    fn base_item() -> JobEnvelope {
        JobEnvelope::new("TestWorker", vec![json!(1), json!(2)]).with_metadata(Metadata::new())
    }

    fn configured() -> (Arc<RecordingPublisher>, CluesConfig) {
        let publisher = Arc::new(RecordingPublisher::default());
        let config = CluesConfig::new(publisher.clone());
        (publisher, config)
    }

    fn assert_common_fields(event: &Event) {
        assert_eq!(event.queue, "test_queue");
        assert_eq!(event.job_class, "TestWorker");
        assert_eq!(event.job_args, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_perform_disabled_delegates() {
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), CluesConfig::disabled());

        assert_eq!(job.perform().await.unwrap(), 42);
        assert_eq!(job.inner().performed, 1);
        assert_eq!(job.payload(), &base_item());
    }

    #[tokio::test]
    async fn test_fail_disabled_delegates() {
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), CluesConfig::disabled());

        let result = job.fail(WorkerError::new("boom")).await;

        assert_eq!(result, "failure recorded");
        assert_eq!(job.inner().failures, vec!["boom"]);
        assert_eq!(job.payload(), &base_item());
    }

    #[tokio::test]
    async fn test_perform_publishes_started_then_finished() {
        let (publisher, config) = configured();
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), config);

        assert_eq!(job.perform().await.unwrap(), 42);

        assert_eq!(
            publisher.event_types(),
            vec![EventType::PerformStarted, EventType::PerformFinished]
        );
        let events = publisher.events();
        for event in &events {
            assert_common_fields(event);
        }
        assert!(events[0].metadata.time_to_perform.is_none());
        let took = events[1].metadata.time_to_perform.unwrap();
        assert!(took >= Duration::from_millis(5), "took {:?}", took);
        assert_eq!(events[1].metadata.process, Some(std::process::id()));
    }

    #[tokio::test]
    async fn test_perform_error_propagates_without_finish_event() {
        let (publisher, config) = configured();
        let job = TestJob::new(base_item()).failing_with(WorkerError::new("boom"));
        let mut job = InstrumentedJob::new(job, config);

        let err = job.perform().await.unwrap_err();

        assert_eq!(err.message, "boom");
        assert_eq!(publisher.event_types(), vec![EventType::PerformStarted]);
    }

    #[tokio::test]
    async fn test_fail_publishes_failed_event() {
        let (publisher, config) = configured();
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), config);

        let result = job.fail(WorkerError::new("test")).await;

        assert_eq!(result, "failure recorded");
        assert_eq!(job.inner().failures, vec!["test"]);

        let event = publisher.only(EventType::Failed);
        assert_common_fields(&event);
        let metadata = &event.metadata;
        assert!(metadata.exception_class.as_deref().unwrap().ends_with("WorkerError"));
        assert_eq!(metadata.exception_message.as_deref(), Some("test"));
        assert!(metadata.exception_backtrace.is_some());
        // Never performed, so no execution time
        assert_eq!(metadata.time_to_perform, Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_fail_after_perform_measures_execution() {
        let (publisher, config) = configured();
        let job = TestJob::new(base_item()).failing_with(WorkerError::new("boom"));
        let mut job = InstrumentedJob::new(job, config);

        let err = job.perform().await.unwrap_err();
        job.fail(err).await;

        assert_eq!(
            publisher.event_types(),
            vec![EventType::PerformStarted, EventType::Failed]
        );
        let failed = &publisher.events()[1];
        assert!(failed.metadata.time_to_perform.unwrap() >= Duration::from_millis(5));
        assert_eq!(job.inner().failures, vec!["boom"]);
    }

    #[tokio::test]
    async fn test_fail_includes_backtrace() {
        let (publisher, config) = configured();
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), config);

        let error = WorkerError::raised("test");
        let captured = error
            .trace
            .as_ref()
            .is_some_and(|b| b.status() == std::backtrace::BacktraceStatus::Captured);
        job.fail(error).await;

        let event = publisher.only(EventType::Failed);
        let backtrace = event.metadata.exception_backtrace.unwrap();
        if captured {
            assert!(!backtrace.is_empty());
        }
    }

    #[tokio::test]
    async fn test_job_without_metadata_passes_through() {
        let (publisher, config) = configured();
        let item = JobEnvelope::new("TestWorker", vec![json!(1), json!(2)]);
        let mut job = InstrumentedJob::new(TestJob::new(item.clone()), config);

        job.perform().await.unwrap();
        job.fail(WorkerError::new("boom")).await;

        assert!(publisher.events().is_empty());
        assert_eq!(job.payload(), &item);
    }

    #[tokio::test]
    async fn test_metadata_accumulates() {
        let (publisher, config) = configured();
        let item = base_item().with_metadata(Metadata {
            event_hash: Some("abc".to_string()),
            time_in_queue: Some(Duration::from_millis(3)),
            ..Default::default()
        });
        let mut job = InstrumentedJob::new(TestJob::new(item), config);

        job.perform().await.unwrap();

        let finished = &publisher.events()[1];
        assert_eq!(finished.metadata.event_hash.as_deref(), Some("abc"));
        assert_eq!(finished.metadata.time_in_queue, Some(Duration::from_millis(3)));
        assert!(finished.metadata.time_to_perform.is_some());
    }

    #[tokio::test]
    async fn test_publisher_failure_does_not_change_outcome() {
        let config = CluesConfig::new(Arc::new(FailingPublisher));
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), config);

        assert_eq!(job.perform().await.unwrap(), 42);
        assert_eq!(job.fail(WorkerError::new("boom")).await, "failure recorded");
    }

    #[tokio::test]
    async fn test_base_operations_skip_instrumentation() {
        let (publisher, config) = configured();
        let mut job = InstrumentedJob::new(TestJob::new(base_item()), config);

        assert_eq!(job.base_perform().await.unwrap(), 42);
        assert_eq!(job.base_fail(WorkerError::new("boom")).await, "failure recorded");
        assert!(publisher.events().is_empty());
    }
}
