pub mod json;

use serde_json::Value;

use crate::{EnvelopeFields, JobEnvelope, QueueResult};

/// Turns job envelopes into message bodies and back
pub trait EnvelopeCodec: Send + Sync {
    /// Serialize an envelope into a message body
    fn encode(&self, envelope: &JobEnvelope) -> QueueResult<String>;

    /// Parse a message body. Fails with [`crate::QueueError::Decode`] on malformed input.
    fn decode(&self, body: &str) -> QueueResult<JobEnvelope>;

    /// Get codec identifier
    fn codec_id(&self) -> &'static str;

    /// Merge a job reference, its data and the driver fields into one serialized body
    fn encode_job(&self, job: &str, data: Value, fields: EnvelopeFields) -> QueueResult<String> {
        self.encode(&JobEnvelope::new(job, data, fields))
    }
}
