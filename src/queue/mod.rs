//! Host queue capability and reference backends.
//!
//! [`QueueBackend`] is the push/pop surface the queue decorator wraps. The
//! backends shipped here are deliberately plain FIFO lists keyed by queue
//! name, storing each item as serialized JSON:
//! - **In-Memory**: for tests, development and single-process setups
//! - **Redis**: Resque-compatible lists, shared across processes
//!
//! # Examples
//!
//! ```rust,no_run
//! use cluesq::prelude::*;
//!
//! # async fn example() -> Result<(), CluesError> {
//! // In-memory queue (default)
//! let queue = InMemoryQueue::new();
//!
//! // Redis queue (requires redis-queue feature)
//! # #[cfg(feature = "redis-queue")]
//! let queue = RedisQueue::new("redis://localhost:6379", QueueConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

use crate::envelope::JobEnvelope;
use async_trait::async_trait;

pub mod memory;
pub use memory::InMemoryQueue;

#[cfg(feature = "redis-queue")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
pub mod redis;

#[cfg(feature = "redis-queue")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
pub use redis::RedisQueue;

/// Trait that all queue backends must implement
///
/// The result of `push` is opaque to cluesq and handed back to the caller
/// verbatim, as are errors from either operation.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Whatever the backend reports for a successful push
    type PushOutput: Send;

    /// Error raised by the backend
    type Error: Send;

    /// Append an item to the named queue
    async fn push(&self, queue: &str, item: JobEnvelope) -> Result<Self::PushOutput, Self::Error>;

    /// Remove the oldest item from the named queue
    ///
    /// Returns `None` if the queue is empty.
    async fn pop(&self, queue: &str) -> Result<Option<JobEnvelope>, Self::Error>;
}

#[async_trait]
impl<Q: QueueBackend + ?Sized> QueueBackend for std::sync::Arc<Q> {
    type PushOutput = Q::PushOutput;
    type Error = Q::Error;

    async fn push(&self, queue: &str, item: JobEnvelope) -> Result<Self::PushOutput, Self::Error> {
        (**self).push(queue, item).await
    }

    async fn pop(&self, queue: &str) -> Result<Option<JobEnvelope>, Self::Error> {
        (**self).pop(queue).await
    }
}
