use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by the queue driver and its backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Connection could not be built from the supplied configuration
    #[error("Invalid configuration for `{field}`: {message}")]
    Config { field: String, message: String },

    /// Publish / pull / acknowledge call failed in the backend client
    #[error("Transport error: {0}")]
    Transport(String),

    /// Message attributes rejected before publishing
    #[error("Invalid message attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },

    /// Message body is not a valid job envelope
    #[error("Malformed job envelope: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Unknown ack id: {0}")]
    UnknownAckId(String),

    #[error("Job has already been released")]
    AlreadyReleased,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Create a configuration error for the given field
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an attribute validation error
    pub fn invalid_attribute(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAttribute { .. })
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(QueueError::config("project_id", "missing").is_config());
        assert!(QueueError::transport("unavailable").is_transport());
        assert!(QueueError::invalid_attribute("attempts", "not a string").is_validation());
        assert!(!QueueError::AlreadyReleased.is_transport());
    }

    #[test]
    fn test_error_messages() {
        let err = QueueError::config("project_id", "The PubSub project id is missing");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for `project_id`: The PubSub project id is missing"
        );

        let err = QueueError::invalid_attribute("retries", "value must be a string");
        assert_eq!(err.to_string(), "Invalid message attribute `retries`: value must be a string");
    }
}
