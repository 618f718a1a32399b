use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::JobId;

fn default_attempts() -> u32 {
    1
}

fn missing_id() -> JobId {
    JobId(String::new())
}

/// Serialized job record carried as the message body.
///
/// Key names follow the worker-side wire format (`displayName`, `maxTries`, ...).
/// Fields the driver does not model are kept in [`JobEnvelope::extra`] so that a
/// decode/release/encode cycle never drops data a worker put into the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    /// Human readable job name
    #[serde(default)]
    pub display_name: String,

    /// Reference to the work to perform (opaque to the driver)
    #[serde(default)]
    pub job: String,

    /// Attempt ceiling, enforced by the worker
    #[serde(default)]
    pub max_tries: Option<u32>,

    /// Retry backoff in seconds
    #[serde(default)]
    pub delay: Option<u64>,

    #[serde(default)]
    pub timeout: Option<u64>,

    /// Job payload (opaque to the driver)
    #[serde(default)]
    pub data: Value,

    #[serde(default = "missing_id")]
    pub id: JobId,

    /// Delivery attempts so far, starting at 1
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Driver-owned envelope fields merged with the caller's job and data
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeFields {
    pub id: JobId,
    pub attempts: u32,
    pub max_tries: Option<u32>,
    pub delay: Option<u64>,
    pub timeout: Option<u64>,
    pub extra: Map<String, Value>,
}

impl Default for EnvelopeFields {
    fn default() -> Self {
        Self {
            id: JobId::new(),
            attempts: 1,
            max_tries: None,
            delay: None,
            timeout: None,
            extra: Map::new(),
        }
    }
}

impl EnvelopeFields {
    /// Fields for a first publish: fresh id, `attempts = 1`
    pub fn first_attempt(max_tries: u32, delay: u64) -> Self {
        Self {
            max_tries: Some(max_tries),
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a field outside the modelled key set
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl JobEnvelope {
    /// Build an envelope from a job reference, its data and the driver fields
    pub fn new(job: impl Into<String>, data: Value, fields: EnvelopeFields) -> Self {
        let job = job.into();
        let mut extra = fields.extra;
        // Modelled keys always win over free-form extras.
        for key in ENVELOPE_KEYS {
            extra.remove(*key);
        }

        Self {
            display_name: job.clone(),
            job,
            max_tries: fields.max_tries,
            delay: fields.delay,
            timeout: fields.timeout,
            data,
            id: fields.id,
            attempts: fields.attempts,
            extra,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Look up a field outside the modelled key set
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Keys modelled directly on [`JobEnvelope`]
pub const ENVELOPE_KEYS: &[&str] = &[
    "displayName",
    "job",
    "maxTries",
    "delay",
    "timeout",
    "data",
    "id",
    "attempts",
];
