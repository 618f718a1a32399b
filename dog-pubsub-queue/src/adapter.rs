use std::slice;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::{PubSubBackend, MAX_ACK_DEADLINE_SECONDS},
    codec::{json::JsonCodec, EnvelopeCodec},
    job::{handle::JobHandle, Job},
    observability::LiveMetrics,
    queue::Queue,
    types::attributes::{self, MessageAttributes, RawAttributes},
    Delay, EnvelopeFields, JobEnvelope, JobId, MessageId, PubSubConfig, QueueCtx, QueueError,
    QueueResult, ReceivedMessage,
};

/// Upper bound on messages pulled (and handed back) by [`PubSubQueue::size`]
pub const SIZE_PROBE_LIMIT: usize = 1000;

/// Queue driver mapping job-queue semantics onto a pub/sub backend.
///
/// A logical queue name `q` publishes to topic `topic_suffix + q` and pulls
/// from subscription `subscriber_suffix + q`. The adapter holds no mutable
/// state besides its counters; clones share backend, codec and metrics.
pub struct PubSubQueue<B: PubSubBackend + ?Sized> {
    backend: Arc<B>,
    codec: Arc<dyn EnvelopeCodec>,
    metrics: Arc<LiveMetrics>,
    config: Arc<PubSubConfig>,
    ctx: QueueCtx,
}

impl<B: PubSubBackend + 'static> PubSubQueue<B> {
    /// Create a queue over `backend` with the given connection settings
    pub fn new(backend: B, config: PubSubConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            codec: Arc::new(JsonCodec),
            metrics: Arc::new(LiveMetrics::new()),
            config: Arc::new(config),
            ctx: QueueCtx::default(),
        }
    }

    /// Use a different envelope codec
    pub fn with_codec<C: EnvelopeCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Execution context attached to every popped job
    pub fn with_context(mut self, ctx: QueueCtx) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn codec(&self) -> &dyn EnvelopeCodec {
        self.codec.as_ref()
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }

    pub fn context(&self) -> &QueueCtx {
        &self.ctx
    }

    pub fn connection_name(&self) -> &str {
        &self.ctx.connection_name
    }

    pub fn default_queue(&self) -> &str {
        &self.config.queue
    }

    pub fn topic_suffix(&self) -> &str {
        &self.config.topic_suffix
    }

    pub fn subscriber_suffix(&self) -> &str {
        &self.config.subscriber_suffix
    }

    pub fn max_tries(&self) -> u32 {
        self.config.max_tries
    }

    pub fn retry_delay(&self) -> u64 {
        self.config.retry_delay
    }

    /// Logical queue name, falling back to the default for `None` or `""`
    pub fn queue_name<'a>(&'a self, queue: Option<&'a str>) -> &'a str {
        match queue {
            Some(name) if !name.is_empty() => name,
            _ => &self.config.queue,
        }
    }

    /// Topic a queue publishes to
    pub fn topic_for(&self, queue: Option<&str>) -> String {
        format!("{}{}", self.config.topic_suffix, self.queue_name(queue))
    }

    /// Subscription a queue pulls from
    pub fn subscription_for(&self, queue: Option<&str>) -> String {
        format!("{}{}", self.config.subscriber_suffix, self.queue_name(queue))
    }

    /// Fresh envelope id
    pub fn random_id(&self) -> JobId {
        JobId::new()
    }

    /// Make sure the queue's subscription exists and is bound to its topic.
    ///
    /// Messages published before the subscription exists are never delivered to it.
    #[instrument(skip_all, fields(queue = ?queue))]
    pub async fn declare(&self, queue: Option<&str>) -> QueueResult<()> {
        let topic = self.topic_for(queue);
        let subscription = self.subscription_for(queue);
        self.backend.ensure_subscription(&subscription, &topic).await?;
        debug!(%topic, %subscription, "Declared queue");
        Ok(())
    }

    /// Push a typed job; `J::MAX_TRIES` / `J::RETRY_DELAY` override the connection defaults
    pub async fn dispatch<J: Job>(&self, job: &J, queue: Option<&str>) -> QueueResult<MessageId> {
        let payload = self.create_typed_payload(job)?;
        let message_id = self.push_raw(payload, queue, RawAttributes::new()).await?;
        self.metrics.record_pushed();
        Ok(message_id)
    }

    /// Push a typed job that becomes available after `delay`
    pub async fn dispatch_later<J: Job>(
        &self,
        delay: impl Into<Delay> + Send,
        job: &J,
        queue: Option<&str>,
    ) -> QueueResult<MessageId> {
        let payload = self.create_typed_payload(job)?;
        let message_id = self
            .push_raw(payload, queue, available_at_attributes(delay.into()))
            .await?;
        self.metrics.record_delayed();
        Ok(message_id)
    }

    /// [`Queue::release`] with extra attributes merged into the republished message.
    ///
    /// The extra attributes and the `attempts` attribute are validated before
    /// anything is published; a validation failure publishes nothing.
    #[instrument(skip_all, fields(queue = ?queue, attempts = attempts, delay_seconds = delay_seconds))]
    pub async fn release_with_attributes(
        &self,
        mut envelope: JobEnvelope,
        queue: Option<&str>,
        attempts: u32,
        delay_seconds: u64,
        extra: RawAttributes,
    ) -> QueueResult<MessageId> {
        envelope.attempts = attempts;

        let mut options = extra;
        options.insert(attributes::ATTEMPTS.to_string(), Value::String(attempts.to_string()));
        let validated = self.backend.validate_attributes(&options)?;

        let available_at = Delay::seconds(delay_seconds).available_at_timestamp(Utc::now());
        let mut merged = MessageAttributes::new();
        merged.insert(attributes::AVAILABLE_AT.to_string(), available_at.to_string());
        merged.extend(validated);

        let payload = self.codec.encode(&envelope)?;
        let message_id = self.publish(queue, &payload, &merged).await?;

        self.metrics.record_released();
        info!(
            message_id = %message_id,
            job_id = %envelope.id,
            attempts,
            available_at,
            "Released job back onto queue"
        );
        Ok(message_id)
    }

    fn create_payload(&self, job: &str, data: Value) -> QueueResult<String> {
        self.codec.encode_job(
            job,
            data,
            EnvelopeFields::first_attempt(self.config.max_tries, self.config.retry_delay),
        )
    }

    fn create_typed_payload<J: Job>(&self, job: &J) -> QueueResult<String> {
        let data = serde_json::to_value(job)?;
        let fields = EnvelopeFields::first_attempt(
            J::MAX_TRIES.unwrap_or(self.config.max_tries),
            J::RETRY_DELAY.unwrap_or(self.config.retry_delay),
        );
        let envelope =
            JobEnvelope::new(J::JOB_TYPE, data, fields).with_display_name(job.display_name());
        self.codec.encode(&envelope)
    }

    /// Single publish path: resolve the topic and hand validated attributes to the backend
    async fn publish(
        &self,
        queue: Option<&str>,
        payload: &str,
        attributes: &MessageAttributes,
    ) -> QueueResult<MessageId> {
        let topic = self.topic_for(queue);
        let receipt = self.backend.publish(&topic, payload, attributes).await?;

        let message_id = receipt
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::transport(format!("publish to '{}' returned no message id", topic)))?;

        debug!(%topic, message_id = %message_id, "Published message");
        Ok(message_id)
    }

    /// Hand back an out-of-contract batch so none of it waits out a lease
    async fn return_to_backend(&self, subscription: &str, messages: &[ReceivedMessage]) {
        if !self.backend.capabilities().negative_ack {
            return;
        }
        if let Err(e) = self.backend.nack(subscription, messages).await {
            warn!(%subscription, error = %e, "Failed to hand back pulled messages");
        }
    }

    /// Keep a message leased until its `availableAt` time when the backend
    /// does not schedule delivery itself. Returns true if it was deferred.
    async fn defer_if_early(&self, subscription: &str, message: &ReceivedMessage) -> QueueResult<bool> {
        if self.backend.capabilities().scheduled_delivery {
            return Ok(false);
        }
        let Some(available_at) = message.available_at() else {
            return Ok(false);
        };

        let remaining_ms = (available_at - Utc::now()).num_milliseconds();
        if remaining_ms <= 0 {
            return Ok(false);
        }

        let seconds = u32::try_from((remaining_ms + 999) / 1000)
            .unwrap_or(MAX_ACK_DEADLINE_SECONDS)
            .clamp(1, MAX_ACK_DEADLINE_SECONDS);
        self.backend
            .modify_ack_deadline(subscription, slice::from_ref(message), seconds)
            .await?;

        self.metrics.record_deferred();
        debug!(
            %subscription,
            message_id = %message.id(),
            %available_at,
            seconds,
            "Message not yet available, deferred"
        );
        Ok(true)
    }
}

#[async_trait]
impl<B: PubSubBackend + 'static> Queue for PubSubQueue<B> {
    type Job = JobHandle<B>;

    #[instrument(skip_all, fields(job = job, queue = ?queue))]
    async fn push(&self, job: &str, data: Value, queue: Option<&str>) -> QueueResult<MessageId> {
        let payload = self.create_payload(job, data)?;
        let message_id = self.push_raw(payload, queue, RawAttributes::new()).await?;

        self.metrics.record_pushed();
        info!(message_id = %message_id, "Pushed job");
        Ok(message_id)
    }

    #[instrument(skip_all, fields(queue = ?queue, attributes = attributes.len()))]
    async fn push_raw(
        &self,
        payload: String,
        queue: Option<&str>,
        attributes: RawAttributes,
    ) -> QueueResult<MessageId> {
        let validated = self.backend.validate_attributes(&attributes)?;
        self.publish(queue, &payload, &validated).await
    }

    #[instrument(skip_all, fields(job = job, queue = ?queue, delay = ?delay))]
    async fn later(
        &self,
        delay: Delay,
        job: &str,
        data: Value,
        queue: Option<&str>,
    ) -> QueueResult<MessageId> {
        let payload = self.create_payload(job, data)?;
        let message_id = self
            .push_raw(payload, queue, available_at_attributes(delay))
            .await?;

        self.metrics.record_delayed();
        info!(message_id = %message_id, "Pushed delayed job");
        Ok(message_id)
    }

    #[instrument(skip_all, fields(queue = ?queue))]
    async fn pop(&self, queue: Option<&str>) -> QueueResult<Option<JobHandle<B>>> {
        let queue_name = self.queue_name(queue).to_string();
        let topic = self.topic_for(Some(&queue_name));
        let subscription = self.subscription_for(Some(&queue_name));

        let mut messages = self.backend.consume(&subscription, &topic).await?;

        let message = match messages.len() {
            0 => {
                self.metrics.record_empty_pull();
                debug!(%subscription, "No job available");
                return Ok(None);
            }
            1 => messages.remove(0),
            count => {
                self.metrics.record_anomalous_pull();
                warn!(
                    %subscription,
                    count,
                    "Pull returned more than one message; handing all back and reporting no job"
                );
                self.return_to_backend(&subscription, &messages).await;
                return Ok(None);
            }
        };

        if self.defer_if_early(&subscription, &message).await? {
            return Ok(None);
        }

        self.backend
            .acknowledge(&subscription, slice::from_ref(&message))
            .await?;
        self.metrics.record_popped();
        debug!(%subscription, message_id = %message.id(), "Popped job");

        Ok(Some(JobHandle::new(
            self.clone(),
            message,
            queue_name,
            self.ctx.clone(),
        )))
    }

    async fn release(
        &self,
        envelope: JobEnvelope,
        queue: Option<&str>,
        attempts: u32,
        delay_seconds: u64,
    ) -> QueueResult<MessageId> {
        self.release_with_attributes(envelope, queue, attempts, delay_seconds, RawAttributes::new())
            .await
    }

    /// Estimate only: pub/sub has no true queue depth. Pulls up to
    /// [`SIZE_PROBE_LIMIT`] messages, counts them and hands them all back.
    ///
    /// A backend without `negative_ack` cannot hand them back: the counted
    /// messages stay leased, and invisible to [`Queue::pop`], until their ack
    /// deadline passes.
    #[instrument(skip_all, fields(queue = ?queue))]
    async fn size(&self, queue: Option<&str>) -> QueueResult<usize> {
        let topic = self.topic_for(queue);
        let subscription = self.subscription_for(queue);

        let messages = self
            .backend
            .pull(&subscription, &topic, SIZE_PROBE_LIMIT)
            .await?;
        if !messages.is_empty() {
            self.return_to_backend(&subscription, &messages).await;
        }

        Ok(messages.len())
    }
}

impl<B: PubSubBackend + ?Sized> std::fmt::Debug for PubSubQueue<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubQueue")
            .field("connection", &self.ctx.connection_name)
            .field("queue", &self.config.queue)
            .field("topic_suffix", &self.config.topic_suffix)
            .field("subscriber_suffix", &self.config.subscriber_suffix)
            .field("codec", &self.codec.codec_id())
            .finish()
    }
}

impl<B: PubSubBackend + ?Sized> Clone for PubSubQueue<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            codec: self.codec.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

fn available_at_attributes(delay: Delay) -> RawAttributes {
    let mut attrs = RawAttributes::new();
    attrs.insert(
        attributes::AVAILABLE_AT.to_string(),
        Value::String(delay.available_at_timestamp(Utc::now()).to_string()),
    );
    attrs
}
