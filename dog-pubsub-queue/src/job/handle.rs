use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    backend::PubSubBackend, queue::Queue, types::attributes::MessageAttributes, JobEnvelope,
    MessageId, PubSubQueue, QueueCtx, QueueError, QueueResult, ReceivedMessage,
};

/// One delivery of a job, popped from a [`PubSubQueue`].
///
/// The underlying message is already acknowledged when the handle is created,
/// so the backend never redelivers it; a retry is a logical republish through
/// [`JobHandle::release`]. A handle can be released once.
pub struct JobHandle<B: PubSubBackend + 'static> {
    queue: PubSubQueue<B>,
    message: ReceivedMessage,
    queue_name: String,
    ctx: QueueCtx,
    deleted: bool,
    released: bool,
    failed: bool,
}

impl<B: PubSubBackend + 'static> JobHandle<B> {
    pub(crate) fn new(
        queue: PubSubQueue<B>,
        message: ReceivedMessage,
        queue_name: String,
        ctx: QueueCtx,
    ) -> Self {
        Self {
            queue,
            message,
            queue_name,
            ctx,
            deleted: false,
            released: false,
            failed: false,
        }
    }

    /// Backend message id (not the envelope id)
    pub fn job_id(&self) -> &MessageId {
        self.message.id()
    }

    /// Serialized envelope as delivered
    pub fn raw_body(&self) -> &str {
        self.message.data()
    }

    /// Decoded envelope
    pub fn payload(&self) -> QueueResult<JobEnvelope> {
        self.queue.codec().decode(self.raw_body())
    }

    /// Attempt count from the envelope; 1 if the body does not decode
    pub fn attempts(&self) -> u32 {
        self.payload()
            .map(|envelope| envelope.attempts)
            .ok()
            .filter(|attempts| *attempts >= 1)
            .unwrap_or(1)
    }

    pub fn max_tries(&self) -> Option<u32> {
        self.payload().ok().and_then(|envelope| envelope.max_tries)
    }

    /// Retry backoff carried in the envelope, in seconds
    pub fn retry_delay(&self) -> Option<u64> {
        self.payload().ok().and_then(|envelope| envelope.delay)
    }

    /// Display name of the job, falling back to its job reference
    pub fn name(&self) -> Option<String> {
        let envelope = self.payload().ok()?;
        if envelope.display_name.is_empty() {
            Some(envelope.job).filter(|job| !job.is_empty())
        } else {
            Some(envelope.display_name)
        }
    }

    /// Deserialize the envelope's `data` into a typed job
    pub fn data_as<T: DeserializeOwned>(&self) -> QueueResult<T> {
        let envelope = self.payload()?;
        serde_json::from_value(envelope.data).map_err(|e| QueueError::Decode(e.to_string()))
    }

    /// Logical queue the job was popped from
    pub fn queue(&self) -> &str {
        &self.queue_name
    }

    pub fn connection_name(&self) -> &str {
        &self.ctx.connection_name
    }

    pub fn context(&self) -> &QueueCtx {
        &self.ctx
    }

    pub fn message(&self) -> &ReceivedMessage {
        &self.message
    }

    pub fn attributes(&self) -> &MessageAttributes {
        self.message.attributes()
    }

    /// `availableAt` tag of the delivery, if any
    pub fn available_at(&self) -> Option<DateTime<Utc>> {
        self.message.available_at()
    }

    /// Republish the job with `attempts + 1`, available after `delay_seconds`.
    ///
    /// A body that does not decode cannot be republished and yields
    /// [`QueueError::Decode`]. A failed publish leaves the handle unreleased,
    /// so the caller can retry.
    pub async fn release(&mut self, delay_seconds: u64) -> QueueResult<MessageId> {
        if self.released {
            return Err(QueueError::AlreadyReleased);
        }

        let attempts = self.attempts().saturating_add(1);
        let envelope = self.payload()?;

        debug!(
            message_id = %self.message.id(),
            queue = %self.queue_name,
            attempts,
            delay_seconds,
            "Releasing job"
        );

        let message_id = self
            .queue
            .release(envelope, Some(&self.queue_name), attempts, delay_seconds)
            .await?;
        self.released = true;
        Ok(message_id)
    }

    /// Mark the job as finished; the delivery was acknowledged on pop
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_deleted_or_released(&self) -> bool {
        self.deleted || self.released
    }

    pub fn mark_as_failed(&mut self) {
        self.failed = true;
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

impl<B: PubSubBackend + 'static> std::fmt::Debug for JobHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("message_id", self.message.id())
            .field("queue", &self.queue_name)
            .field("connection", &self.ctx.connection_name)
            .field("deleted", &self.deleted)
            .field("released", &self.released)
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::{backend::memory::MemoryPubSub, PubSubConfig};
    use serde_json::json;

    const MESSAGE_ID: &str = "123456789";

    fn handle_with_body(body: &str) -> JobHandle<MemoryPubSub> {
        let queue = PubSubQueue::new(
            MemoryPubSub::new().with_subscription("default", "default"),
            PubSubConfig::new("project"),
        )
        .with_context(QueueCtx::new("gcpubsub"));
        let message = ReceivedMessage::new(MessageId::from(MESSAGE_ID), "ack-1", body);
        JobHandle::new(queue, message, "default".to_string(), QueueCtx::new("gcpubsub"))
    }

    fn body_with_attempts(attempts: u32) -> String {
        json!({"id": MESSAGE_ID, "data": {"test": "job"}, "attempts": attempts}).to_string()
    }

    #[test]
    fn test_identity_and_body() {
        let body = body_with_attempts(2);
        let handle = handle_with_body(&body);

        assert_eq!(handle.job_id(), &MessageId::from(MESSAGE_ID));
        assert_eq!(handle.raw_body(), body);
        assert_eq!(handle.queue(), "default");
        assert_eq!(handle.connection_name(), "gcpubsub");
    }

    #[test]
    fn test_attempts_from_envelope() {
        assert_eq!(handle_with_body(&body_with_attempts(2)).attempts(), 2);
    }

    #[test]
    fn test_attempts_default_to_one() {
        assert_eq!(handle_with_body(r#"{"data":null}"#).attempts(), 1);
        assert_eq!(handle_with_body("not json").attempts(), 1);
        assert_eq!(handle_with_body(r#"{"attempts":0}"#).attempts(), 1);
    }

    #[tokio::test]
    async fn test_release_republishes_with_incremented_attempts() {
        let mut handle = handle_with_body(&body_with_attempts(2));

        handle.release(30).await.unwrap();

        assert!(handle.is_released());
        assert!(handle.is_deleted_or_released());
        let published = handle.queue.backend().published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "default");
        assert_eq!(published[0].attributes.get("attempts").map(String::as_str), Some("3"));

        let envelope: JobEnvelope = serde_json::from_str(&published[0].body).unwrap();
        assert_eq!(envelope.attempts, 3);
        assert_eq!(envelope.data, json!({"test": "job"}));
        assert_eq!(envelope.id.as_str(), MESSAGE_ID);
    }

    #[tokio::test]
    async fn test_release_is_single_use() {
        let mut handle = handle_with_body(&body_with_attempts(1));

        handle.release(0).await.unwrap();
        let err = handle.release(0).await.unwrap_err();

        assert_eq!(err, QueueError::AlreadyReleased);
        assert_eq!(handle.queue.backend().publish_count(), 1);
    }

    #[tokio::test]
    async fn test_release_of_malformed_body_publishes_nothing() {
        let mut handle = handle_with_body("not json");

        let err = handle.release(10).await.unwrap_err();

        assert!(matches!(err, QueueError::Decode(_)));
        assert_eq!(handle.queue.backend().publish_count(), 0);
    }

    #[test]
    fn test_lifecycle_flags() {
        let mut handle = handle_with_body(&body_with_attempts(1));
        assert!(!handle.is_deleted_or_released());

        handle.delete();
        handle.mark_as_failed();

        assert!(handle.is_deleted());
        assert!(handle.has_failed());
        assert!(!handle.is_released());
    }

    #[test]
    fn test_name_falls_back_to_job_reference() {
        let handle = handle_with_body(r#"{"job":"SendEmail","data":null}"#);
        assert_eq!(handle.name().as_deref(), Some("SendEmail"));
        assert_eq!(handle_with_body(r#"{"data":null}"#).name(), None);
    }

    #[tokio::test]
    async fn test_failed_release_can_be_retried() {
        let mut handle = handle_with_body(&body_with_attempts(1));
        handle.queue.backend().fail_next_publish("unavailable");

        let err = handle.release(5).await.unwrap_err();
        assert_eq!(err, QueueError::Transport("unavailable".to_string()));
        assert!(!handle.is_released());
        assert_eq!(handle.queue.backend().publish_count(), 0);

        handle.release(5).await.unwrap();
        assert!(handle.is_released());
        let published = handle.queue.backend().published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].attributes.get("attempts").map(String::as_str), Some("2"));
    }
}
