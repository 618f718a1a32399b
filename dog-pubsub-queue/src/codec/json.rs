use crate::{codec::EnvelopeCodec, JobEnvelope, QueueError, QueueResult};

/// JSON codec for job envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn encode(&self, envelope: &JobEnvelope) -> QueueResult<String> {
        Ok(serde_json::to_string(envelope)?)
    }

    fn decode(&self, body: &str) -> QueueResult<JobEnvelope> {
        serde_json::from_str(body).map_err(|e| QueueError::Decode(e.to_string()))
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}
