#[cfg(feature = "memory")]
pub mod memory;

use async_trait::async_trait;

use crate::{
    types::attributes::{self, MessageAttributes, RawAttributes},
    BackendCapabilities, PublishReceipt, QueueResult, ReceivedMessage,
};

/// Longest ack deadline a backend accepts, in seconds
pub const MAX_ACK_DEADLINE_SECONDS: u32 = 600;

/// Settings the connector hands to a backend client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Project / endpoint identifier the client is bound to
    pub project_id: String,
    /// Upper bound on messages returned by one `consume` call
    pub max_messages: usize,
    /// Verbose per-call transport logging
    pub debug: bool,
}

impl ClientSettings {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            max_messages: 1,
            debug: false,
        }
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Pub/sub primitives the queue driver is built on
#[async_trait]
pub trait PubSubBackend: Send + Sync {
    /// Publish one body to a topic, creating the topic on first use
    async fn publish(
        &self,
        topic: &str,
        body: &str,
        attributes: &MessageAttributes,
    ) -> QueueResult<PublishReceipt>;

    /// Lease up to `max_messages` messages without acknowledging them.
    /// Creates the subscription, bound to `topic`, on first use.
    async fn pull(
        &self,
        subscription: &str,
        topic: &str,
        max_messages: usize,
    ) -> QueueResult<Vec<ReceivedMessage>>;

    /// Acknowledge deliveries so they are never redelivered
    async fn acknowledge(&self, subscription: &str, messages: &[ReceivedMessage]) -> QueueResult<()>;

    /// Move the lease deadline of deliveries to `seconds` from now
    async fn modify_ack_deadline(
        &self,
        subscription: &str,
        messages: &[ReceivedMessage],
        seconds: u32,
    ) -> QueueResult<()>;

    /// Make sure `subscription` exists and is bound to `topic`
    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> QueueResult<()>;

    /// Upper bound on messages returned by [`PubSubBackend::consume`]
    fn max_messages(&self) -> usize;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    /// Pull with the client's configured batch size
    async fn consume(&self, subscription: &str, topic: &str) -> QueueResult<Vec<ReceivedMessage>> {
        self.pull(subscription, topic, self.max_messages()).await
    }

    /// Hand deliveries back for immediate redelivery
    async fn nack(&self, subscription: &str, messages: &[ReceivedMessage]) -> QueueResult<()> {
        self.modify_ack_deadline(subscription, messages, 0).await
    }

    /// Check caller attributes against the backend's attribute constraints
    fn validate_attributes(&self, raw: &RawAttributes) -> QueueResult<MessageAttributes> {
        attributes::validate_attributes(raw)
    }
}

/// Builds a backend client from connector settings
pub trait BackendFactory: Send + Sync {
    type Backend: PubSubBackend + 'static;

    fn create(&self, settings: &ClientSettings) -> QueueResult<Self::Backend>;
}

impl<F, B> BackendFactory for F
where
    F: Fn(&ClientSettings) -> QueueResult<B> + Send + Sync,
    B: PubSubBackend + 'static,
{
    type Backend = B;

    fn create(&self, settings: &ClientSettings) -> QueueResult<B> {
        self(settings)
    }
}
