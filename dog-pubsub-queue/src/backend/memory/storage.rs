use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::{
    backend::{ClientSettings, PubSubBackend, MAX_ACK_DEADLINE_SECONDS},
    types::attributes::MessageAttributes,
    BackendCapabilities, MessageId, PublishReceipt, QueueError, QueueResult, ReceivedMessage,
};

/// Ack deadline applied to fresh leases unless configured otherwise
pub const DEFAULT_ACK_DEADLINE: Duration = Duration::from_secs(10);

/// A publish call as recorded by the in-memory backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message_id: MessageId,
    pub body: String,
    pub attributes: MessageAttributes,
}

#[derive(Debug, Clone)]
struct Lease {
    ack_id: String,
    deadline: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    data: String,
    attributes: MessageAttributes,
    publish_time: DateTime<Utc>,
    deliveries: u32,
    lease: Option<Lease>,
}

impl StoredMessage {
    fn is_pullable(&self, now: DateTime<Utc>) -> bool {
        match &self.lease {
            None => true,
            Some(lease) => lease.deadline <= now,
        }
    }
}

#[derive(Debug, Default)]
struct SubscriptionState {
    topic: String,
    messages: VecDeque<StoredMessage>,
}

#[derive(Debug, Default)]
struct Storage {
    /// topic -> bound subscription names
    topics: HashMap<String, Vec<String>>,
    subscriptions: HashMap<String, SubscriptionState>,
    published: Vec<PublishedMessage>,
    next_message_id: u64,
}

impl Storage {
    fn ensure_subscription(&mut self, subscription: &str, topic: &str) {
        if self.subscriptions.contains_key(subscription) {
            return;
        }
        self.subscriptions.insert(
            subscription.to_string(),
            SubscriptionState {
                topic: topic.to_string(),
                messages: VecDeque::new(),
            },
        );
        let bound = self.topics.entry(topic.to_string()).or_default();
        if !bound.iter().any(|s| s == subscription) {
            bound.push(subscription.to_string());
        }
    }

    fn subscription_mut(&mut self, subscription: &str) -> QueueResult<&mut SubscriptionState> {
        self.subscriptions
            .get_mut(subscription)
            .ok_or_else(|| QueueError::SubscriptionNotFound(subscription.to_string()))
    }
}

#[derive(Debug, Default)]
struct InjectedFailures {
    publish: Option<String>,
    pull: Option<String>,
}

/// In-memory pub/sub backend for testing and development.
///
/// Mirrors topic/subscription semantics: a message is fanned out to every
/// subscription bound to its topic at publish time, pulled messages are leased
/// until acknowledged or their ack deadline passes, and a lapsed lease makes the
/// message pullable again. Clones share the same storage.
#[derive(Clone)]
pub struct MemoryPubSub {
    storage: Arc<RwLock<Storage>>,
    failures: Arc<Mutex<InjectedFailures>>,
    settings: ClientSettings,
    capabilities: BackendCapabilities,
    ack_deadline: Duration,
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::with_settings(ClientSettings::new("memory"))
    }

    pub fn with_settings(settings: ClientSettings) -> Self {
        Self {
            storage: Arc::new(RwLock::new(Storage::default())),
            failures: Arc::new(Mutex::new(InjectedFailures::default())),
            settings,
            capabilities: BackendCapabilities::default(),
            ack_deadline: DEFAULT_ACK_DEADLINE,
        }
    }

    /// Factory usable with [`crate::PubSubConnector`]; every connection gets fresh storage
    pub fn factory() -> impl Fn(&ClientSettings) -> QueueResult<MemoryPubSub> + Send + Sync {
        |settings: &ClientSettings| Ok(MemoryPubSub::with_settings(settings.clone()))
    }

    /// Factory whose connections all share `self`'s storage
    pub fn shared_factory(&self) -> impl Fn(&ClientSettings) -> QueueResult<MemoryPubSub> + Send + Sync {
        let shared = self.clone();
        move |settings: &ClientSettings| {
            let mut backend = shared.clone();
            backend.settings = settings.clone();
            Ok(backend)
        }
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.settings.max_messages = max_messages;
        self
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_ack_deadline(mut self, ack_deadline: Duration) -> Self {
        self.ack_deadline = ack_deadline;
        self
    }

    /// Create a topic/subscription pair up front
    pub fn with_subscription(self, subscription: &str, topic: &str) -> Self {
        self.storage.write().ensure_subscription(subscription, topic);
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Every publish accepted so far, oldest first
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.storage.read().published.clone()
    }

    pub fn publish_count(&self) -> usize {
        self.storage.read().published.len()
    }

    /// Messages currently pullable (not leased, or lease lapsed) on a subscription
    pub fn pending(&self, subscription: &str) -> usize {
        let now = Utc::now();
        self.storage
            .read()
            .subscriptions
            .get(subscription)
            .map(|sub| sub.messages.iter().filter(|m| m.is_pullable(now)).count())
            .unwrap_or(0)
    }

    /// Messages not yet acknowledged on a subscription, leased or not
    pub fn outstanding(&self, subscription: &str) -> usize {
        self.storage
            .read()
            .subscriptions
            .get(subscription)
            .map(|sub| sub.messages.len())
            .unwrap_or(0)
    }

    pub fn has_subscription(&self, subscription: &str) -> bool {
        self.storage.read().subscriptions.contains_key(subscription)
    }

    /// Topic a subscription is bound to
    pub fn subscription_topic(&self, subscription: &str) -> Option<String> {
        self.storage
            .read()
            .subscriptions
            .get(subscription)
            .map(|sub| sub.topic.clone())
    }

    /// Make the next publish fail with a transport error
    pub fn fail_next_publish(&self, message: impl Into<String>) {
        self.failures.lock().publish = Some(message.into());
    }

    /// Make the next pull fail with a transport error
    pub fn fail_next_pull(&self, message: impl Into<String>) {
        self.failures.lock().pull = Some(message.into());
    }

    /// Expire every outstanding lease on a subscription (for testing)
    pub fn expire_leases(&self, subscription: &str) {
        let now = Utc::now();
        if let Some(sub) = self.storage.write().subscriptions.get_mut(subscription) {
            for message in sub.messages.iter_mut() {
                if let Some(lease) = message.lease.as_mut() {
                    lease.deadline = now;
                }
            }
        }
    }

    fn seconds(duration: Duration) -> chrono::Duration {
        chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(0))
    }
}

impl Default for MemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSubBackend for MemoryPubSub {
    async fn publish(
        &self,
        topic: &str,
        body: &str,
        attributes: &MessageAttributes,
    ) -> QueueResult<PublishReceipt> {
        if let Some(reason) = self.failures.lock().publish.take() {
            return Err(QueueError::Transport(reason));
        }

        let now = Utc::now();
        let mut storage = self.storage.write();
        storage.next_message_id += 1;
        let message_id = MessageId(storage.next_message_id.to_string());

        let bound = storage.topics.entry(topic.to_string()).or_default().clone();
        for subscription in &bound {
            if let Some(sub) = storage.subscriptions.get_mut(subscription) {
                sub.messages.push_back(StoredMessage {
                    id: message_id.clone(),
                    data: body.to_string(),
                    attributes: attributes.clone(),
                    publish_time: now,
                    deliveries: 0,
                    lease: None,
                });
            }
        }

        storage.published.push(PublishedMessage {
            topic: topic.to_string(),
            message_id: message_id.clone(),
            body: body.to_string(),
            attributes: attributes.clone(),
        });

        if self.settings.debug {
            debug!(
                topic,
                message_id = %message_id,
                subscriptions = bound.len(),
                bytes = body.len(),
                "memory pubsub: published"
            );
        }

        Ok(PublishReceipt::new(vec![message_id]))
    }

    async fn pull(
        &self,
        subscription: &str,
        topic: &str,
        max_messages: usize,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        if let Some(reason) = self.failures.lock().pull.take() {
            return Err(QueueError::Transport(reason));
        }

        let now = Utc::now();
        let deadline = now
            .checked_add_signed(Self::seconds(self.ack_deadline))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut storage = self.storage.write();
        storage.ensure_subscription(subscription, topic);
        let sub = storage.subscription_mut(subscription)?;

        let mut delivered = Vec::new();
        for message in sub.messages.iter_mut() {
            if delivered.len() >= max_messages {
                break;
            }
            if !message.is_pullable(now) {
                continue;
            }

            let ack_id = Uuid::new_v4().to_string();
            message.deliveries += 1;
            message.lease = Some(Lease {
                ack_id: ack_id.clone(),
                deadline,
            });

            delivered.push(
                ReceivedMessage::new(message.id.clone(), ack_id, message.data.clone())
                    .with_attributes(message.attributes.clone())
                    .with_publish_time(message.publish_time)
                    .with_delivery_attempt(message.deliveries),
            );
        }

        if self.settings.debug {
            debug!(subscription, topic, max_messages, pulled = delivered.len(), "memory pubsub: pulled");
        }

        Ok(delivered)
    }

    async fn acknowledge(&self, subscription: &str, messages: &[ReceivedMessage]) -> QueueResult<()> {
        let mut storage = self.storage.write();
        let sub = storage.subscription_mut(subscription)?;

        for received in messages {
            let position = sub.messages.iter().position(|m| {
                m.lease.as_ref().is_some_and(|lease| lease.ack_id == received.ack_id())
            });
            match position {
                Some(index) => {
                    sub.messages.remove(index);
                }
                None => return Err(QueueError::UnknownAckId(received.ack_id().to_string())),
            }
        }

        if self.settings.debug {
            debug!(subscription, count = messages.len(), "memory pubsub: acknowledged");
        }

        Ok(())
    }

    async fn modify_ack_deadline(
        &self,
        subscription: &str,
        messages: &[ReceivedMessage],
        seconds: u32,
    ) -> QueueResult<()> {
        let seconds = seconds.min(MAX_ACK_DEADLINE_SECONDS);
        let deadline = Utc::now() + chrono::Duration::seconds(i64::from(seconds));
        let mut storage = self.storage.write();
        let sub = storage.subscription_mut(subscription)?;

        for received in messages {
            let lease = sub
                .messages
                .iter_mut()
                .filter_map(|m| m.lease.as_mut())
                .find(|lease| lease.ack_id == received.ack_id())
                .ok_or_else(|| QueueError::UnknownAckId(received.ack_id().to_string()))?;
            lease.deadline = deadline;
        }

        if self.settings.debug {
            debug!(subscription, count = messages.len(), seconds, "memory pubsub: ack deadline modified");
        }

        Ok(())
    }

    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> QueueResult<()> {
        self.storage.write().ensure_subscription(subscription, topic);
        Ok(())
    }

    fn max_messages(&self) -> usize {
        self.settings.max_messages
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryPubSub {
        MemoryPubSub::new().with_subscription("default", "default")
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_bound_subscriptions() {
        let backend = backend().with_subscription("audit", "default");

        let receipt = backend.publish("default", "body", &MessageAttributes::new()).await.unwrap();

        assert_eq!(receipt.message_ids.len(), 1);
        assert_eq!(backend.pending("default"), 1);
        assert_eq!(backend.pending("audit"), 1);
        assert_eq!(backend.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_messages_published_before_subscription_are_not_delivered() {
        let backend = MemoryPubSub::new();
        backend.publish("orders", "lost", &MessageAttributes::new()).await.unwrap();

        let pulled = backend.pull("orders", "orders", 10).await.unwrap();
        assert!(pulled.is_empty());
        assert_eq!(backend.subscription_topic("orders").as_deref(), Some("orders"));
    }

    #[tokio::test]
    async fn test_pull_leases_until_acknowledged() {
        let backend = backend();
        backend.publish("default", "a", &MessageAttributes::new()).await.unwrap();

        let first = backend.consume("default", "default").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].data(), "a");
        assert_eq!(first[0].delivery_attempt(), 1);

        // Leased: not visible to a second puller
        assert!(backend.consume("default", "default").await.unwrap().is_empty());

        backend.acknowledge("default", &first).await.unwrap();
        assert_eq!(backend.outstanding("default"), 0);
    }

    #[tokio::test]
    async fn test_lapsed_lease_is_redelivered() {
        let backend = backend();
        backend.publish("default", "a", &MessageAttributes::new()).await.unwrap();

        let first = backend.consume("default", "default").await.unwrap();
        backend.expire_leases("default");

        let second = backend.consume("default", "default").await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id(), first[0].id());
        assert_eq!(second[0].delivery_attempt(), 2);

        // The stale ack id no longer matches the live lease
        let err = backend.acknowledge("default", &first).await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownAckId(_)));
    }

    #[tokio::test]
    async fn test_nack_makes_message_immediately_pullable() {
        let backend = backend();
        backend.publish("default", "a", &MessageAttributes::new()).await.unwrap();

        let pulled = backend.consume("default", "default").await.unwrap();
        assert_eq!(backend.pending("default"), 0);

        backend.nack("default", &pulled).await.unwrap();
        assert_eq!(backend.pending("default"), 1);
    }

    #[tokio::test]
    async fn test_max_messages_bounds_consume() {
        let backend = backend().with_max_messages(2);
        for body in ["a", "b", "c"] {
            backend.publish("default", body, &MessageAttributes::new()).await.unwrap();
        }

        assert_eq!(backend.consume("default", "default").await.unwrap().len(), 2);
        assert_eq!(backend.pull("default", "default", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_fire_once() {
        let backend = backend();

        backend.fail_next_publish("unavailable");
        let err = backend.publish("default", "a", &MessageAttributes::new()).await.unwrap_err();
        assert_eq!(err, QueueError::Transport("unavailable".to_string()));
        assert_eq!(backend.publish_count(), 0);
        assert!(backend.publish("default", "a", &MessageAttributes::new()).await.is_ok());

        backend.fail_next_pull("deadline exceeded");
        assert!(backend.consume("default", "default").await.unwrap_err().is_transport());
        assert_eq!(backend.consume("default", "default").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_subscription_on_ack() {
        let backend = MemoryPubSub::new();
        let message = ReceivedMessage::new(MessageId::from("1"), "ack", "body");
        let err = backend.acknowledge("missing", &[message]).await.unwrap_err();
        assert_eq!(err, QueueError::SubscriptionNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_huge_ack_deadline_saturates() {
        let backend = backend().with_ack_deadline(Duration::from_secs(10_000_000_000_000));
        backend.publish("default", "body", &MessageAttributes::new()).await.unwrap();

        let pulled = backend.pull("default", "default", 1).await.unwrap();

        assert_eq!(pulled.len(), 1);
        assert_eq!(backend.pending("default"), 0);
        assert_eq!(backend.outstanding("default"), 1);
    }
}
