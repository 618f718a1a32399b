use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{attributes::MessageAttributes, delay::parse_available_at, MessageId};

/// Response to a publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub message_ids: Vec<MessageId>,
}

impl PublishReceipt {
    pub fn new(message_ids: Vec<MessageId>) -> Self {
        Self { message_ids }
    }

    /// First assigned message id (a single-body publish yields exactly one)
    pub fn first(&self) -> Option<&MessageId> {
        self.message_ids.first()
    }
}

/// One message delivered by a pull, leased to the caller until acknowledged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    id: MessageId,
    ack_id: String,
    data: String,
    attributes: MessageAttributes,
    publish_time: DateTime<Utc>,
    delivery_attempt: u32,
}

impl ReceivedMessage {
    pub fn new(id: MessageId, ack_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id,
            ack_id: ack_id.into(),
            data: data.into(),
            attributes: MessageAttributes::new(),
            publish_time: Utc::now(),
            delivery_attempt: 1,
        }
    }

    pub fn with_attributes(mut self, attributes: MessageAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_publish_time(mut self, publish_time: DateTime<Utc>) -> Self {
        self.publish_time = publish_time;
        self
    }

    pub fn with_delivery_attempt(mut self, delivery_attempt: u32) -> Self {
        self.delivery_attempt = delivery_attempt;
        self
    }

    /// Backend message id
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Raw message body
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Lease handle used to acknowledge or extend this delivery
    pub fn ack_id(&self) -> &str {
        &self.ack_id
    }

    pub fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn publish_time(&self) -> DateTime<Utc> {
        self.publish_time
    }

    /// Backend redelivery counter (1 on first delivery)
    pub fn delivery_attempt(&self) -> u32 {
        self.delivery_attempt
    }

    /// Parsed `availableAt` attribute, if present and well-formed
    pub fn available_at(&self) -> Option<DateTime<Utc>> {
        self.attribute(super::attributes::AVAILABLE_AT)
            .and_then(parse_available_at)
    }
}
