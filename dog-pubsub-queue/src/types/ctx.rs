use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Execution context handed to every job handle a queue produces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCtx {
    /// Name of the queue connection the job arrived on
    pub connection_name: String,

    /// Optional trace ID for distributed tracing
    pub trace_id: Option<String>,

    /// Additional tags for observability and filtering
    pub tags: HashMap<String, String>,
}

impl QueueCtx {
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            trace_id: None,
            tags: HashMap::new(),
        }
    }

    /// Add a trace ID for distributed tracing
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Add a tag for observability
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn get_tag(&self, key: &str) -> Option<&String> {
        self.tags.get(key)
    }
}
