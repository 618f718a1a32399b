use async_trait::async_trait;
use serde_json::Value;

use crate::{Delay, JobEnvelope, MessageId, QueueResult, RawAttributes};

/// Generic queue operations a worker pool drives.
///
/// Every `queue` argument is a logical queue name; `None` (or an empty name)
/// selects the connection's default queue.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Handle produced by [`Queue::pop`]
    type Job: Send;

    /// Push a new job; returns the backend message id
    async fn push(&self, job: &str, data: Value, queue: Option<&str>) -> QueueResult<MessageId>;

    /// Publish an already serialized payload with optional attributes
    async fn push_raw(
        &self,
        payload: String,
        queue: Option<&str>,
        attributes: RawAttributes,
    ) -> QueueResult<MessageId>;

    /// Push a job tagged with the time it becomes available
    async fn later(
        &self,
        delay: Delay,
        job: &str,
        data: Value,
        queue: Option<&str>,
    ) -> QueueResult<MessageId>;

    /// Take the next job, if exactly one is available
    async fn pop(&self, queue: Option<&str>) -> QueueResult<Option<Self::Job>>;

    /// Republish an envelope with a new attempt count and a delay
    async fn release(
        &self,
        envelope: JobEnvelope,
        queue: Option<&str>,
        attempts: u32,
        delay_seconds: u64,
    ) -> QueueResult<MessageId>;

    /// Estimated number of pullable messages
    async fn size(&self, queue: Option<&str>) -> QueueResult<usize>;
}
