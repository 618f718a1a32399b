//! Connection configuration for the pub/sub queue driver.
//!
//! [`PubSubConfig`] is supplied once when a connection is built and never
//! mutated afterwards. Only the project id is mandatory; every other field has
//! a default:
//!
//! | field               | env var                    | default     |
//! |---------------------|----------------------------|-------------|
//! | `project_id`        | `PUBSUB_PROJECT_ID`        | (required)  |
//! | `queue`             | `PUBSUB_QUEUE_DEFAULT`     | `"default"` |
//! | `topic_suffix`      | `PUBSUB_TOPIC_SUFFIX`      | `""`        |
//! | `subscriber_suffix` | `PUBSUB_SUBSCRIBER_SUFFIX` | `""`        |
//! | `max_tries`         | `PUBSUB_JOB_MAX_TRIES`     | `1`         |
//! | `retry_delay`       | `PUBSUB_JOB_RETRY_DELAY`   | `0`         |
//! | `debug`             | `APP_DEBUG`                | `false`     |
//!
//! ```rust
//! use dog_pubsub_queue::PubSubConfig;
//!
//! let config = PubSubConfig::new("my-project")
//!     .with_topic_suffix("staging-")
//!     .with_max_tries(3);
//!
//! assert_eq!(config.queue, "default");
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::env;

use crate::{QueueError, QueueResult};

pub const ENV_PROJECT_ID: &str = "PUBSUB_PROJECT_ID";
pub const ENV_QUEUE_DEFAULT: &str = "PUBSUB_QUEUE_DEFAULT";
pub const ENV_TOPIC_SUFFIX: &str = "PUBSUB_TOPIC_SUFFIX";
pub const ENV_SUBSCRIBER_SUFFIX: &str = "PUBSUB_SUBSCRIBER_SUFFIX";
pub const ENV_MAX_TRIES: &str = "PUBSUB_JOB_MAX_TRIES";
pub const ENV_RETRY_DELAY: &str = "PUBSUB_JOB_RETRY_DELAY";
pub const ENV_DEBUG: &str = "APP_DEBUG";

pub const DEFAULT_QUEUE: &str = "default";
pub const DEFAULT_MAX_TRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY: u64 = 0;

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_max_tries() -> u32 {
    DEFAULT_MAX_TRIES
}

/// Queue connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubSubConfig {
    /// Project / endpoint identifier of the pub/sub backend
    #[serde(default)]
    pub project_id: String,

    /// Queue used when an operation names none
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Prepended to a queue name to form its topic
    #[serde(default)]
    pub topic_suffix: String,

    /// Prepended to a queue name to form its subscription
    #[serde(default)]
    pub subscriber_suffix: String,

    /// Attempt ceiling written into every new envelope
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Retry backoff in seconds written into every new envelope
    #[serde(default)]
    pub retry_delay: u64,

    /// Verbose transport logging
    #[serde(default)]
    pub debug: bool,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            queue: default_queue(),
            topic_suffix: String::new(),
            subscriber_suffix: String::new(),
            max_tries: DEFAULT_MAX_TRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            debug: false,
        }
    }
}

impl PubSubConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the `PUBSUB_*` environment variables.
    ///
    /// Unset variables fall back to defaults; a numeric variable that does not
    /// parse is a configuration error. The project id is not checked here, see
    /// [`PubSubConfig::validate`].
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`PubSubConfig::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> QueueResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(project_id) = lookup(ENV_PROJECT_ID) {
            config.project_id = project_id;
        }
        if let Some(queue) = lookup(ENV_QUEUE_DEFAULT) {
            config.queue = queue;
        }
        if let Some(suffix) = lookup(ENV_TOPIC_SUFFIX) {
            config.topic_suffix = suffix;
        }
        if let Some(suffix) = lookup(ENV_SUBSCRIBER_SUFFIX) {
            config.subscriber_suffix = suffix;
        }
        if let Some(raw) = lookup(ENV_MAX_TRIES) {
            config.max_tries = parse_number(ENV_MAX_TRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRY_DELAY) {
            config.retry_delay = parse_number(ENV_RETRY_DELAY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEBUG) {
            config.debug = parse_flag(&raw);
        }

        Ok(config)
    }

    /// Check the one mandatory field
    pub fn validate(&self) -> QueueResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(QueueError::config(
                "project_id",
                "The PubSub project id is missing",
            ));
        }
        Ok(())
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_topic_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.topic_suffix = suffix.into();
        self
    }

    pub fn with_subscriber_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.subscriber_suffix = suffix.into();
        self
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: u64) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> QueueResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| QueueError::config(field, format!("expected a non-negative integer, got '{}'", raw)))
}

/// Interpret an environment toggle such as `APP_DEBUG`
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PubSubConfig::default();
        assert_eq!(config.queue, "default");
        assert_eq!(config.topic_suffix, "");
        assert_eq!(config.subscriber_suffix, "");
        assert_eq!(config.max_tries, 1);
        assert_eq!(config.retry_delay, 0);
        assert!(!config.debug);
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = PubSubConfig::from_lookup(lookup(&[
            (ENV_PROJECT_ID, "google-cloud-project-id"),
            (ENV_QUEUE_DEFAULT, "emails"),
            (ENV_TOPIC_SUFFIX, "mytopicsuffix"),
            (ENV_SUBSCRIBER_SUFFIX, "mysubscribersuffix"),
            (ENV_MAX_TRIES, "3"),
            (ENV_RETRY_DELAY, "10"),
            (ENV_DEBUG, "true"),
        ]))
        .unwrap();

        assert_eq!(config.project_id, "google-cloud-project-id");
        assert_eq!(config.queue, "emails");
        assert_eq!(config.topic_suffix, "mytopicsuffix");
        assert_eq!(config.subscriber_suffix, "mysubscribersuffix");
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.retry_delay, 10);
        assert!(config.debug);
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = PubSubConfig::from_lookup(lookup(&[(ENV_MAX_TRIES, "three")])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(ENV_MAX_TRIES));
    }

    #[test]
    fn test_validate_requires_project_id() {
        assert!(PubSubConfig::default().validate().unwrap_err().is_config());
        assert!(PubSubConfig::new("   ").validate().is_err());
        assert!(PubSubConfig::new("project").validate().is_ok());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: PubSubConfig =
            serde_json::from_str(r#"{"project_id":"p","max_tries":5}"#).unwrap();
        assert_eq!(config.project_id, "p");
        assert_eq!(config.max_tries, 5);
        assert_eq!(config.queue, "default");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
