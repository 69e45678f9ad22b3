//! Host job capability.

use crate::envelope::JobEnvelope;
use crate::event::ExceptionDetails;
use async_trait::async_trait;

/// A job instance as the host queue system executes it.
///
/// cluesq never resolves or invokes job classes itself; the host implements
/// this trait around whatever it uses to run a payload. The job decorator
/// wraps an implementation and forwards every outcome of `perform` and
/// `fail` untouched.
#[async_trait]
pub trait Job: Send {
    /// Value produced by a successful perform
    type Output: Send;

    /// Error a perform can fail with
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whatever the host's failure handling reports back
    type FailOutput: Send;

    /// Queue the job was popped from
    fn queue(&self) -> &str;

    /// Payload the job runs
    fn payload(&self) -> &JobEnvelope;

    /// Mutable access to the payload, used to record metadata
    fn payload_mut(&mut self) -> &mut JobEnvelope;

    /// Execute the job
    async fn perform(&mut self) -> Result<Self::Output, Self::Error>;

    /// Hand a failure to the host's failure handling
    async fn fail(&mut self, error: Self::Error) -> Self::FailOutput;

    /// Describe an error for the `failed` event.
    ///
    /// The default reads the type name, message and `source()` chain.
    /// Override it when the error carries a real
    /// [`Backtrace`](std::backtrace::Backtrace), see
    /// [`ExceptionDetails::with_backtrace`].
    fn describe_failure(error: &Self::Error) -> ExceptionDetails
    where
        Self: Sized,
    {
        ExceptionDetails::capture(error)
    }
}
