//! # dog-pubsub-queue: Job Queue Driver over Pub/Sub
//!
//! Maps classic job-queue operations (push, delayed push, pop, release,
//! size) onto a topic/subscription messaging backend.
//!
//! - **One topic per queue**: logical queue `q` publishes to
//!   `topic_suffix + q` and pulls from `subscriber_suffix + q`
//! - **Self-describing envelopes**: every job carries its id, attempt count,
//!   retry ceiling and backoff in a JSON body
//! - **Logical retries**: a popped job is acknowledged at once; releasing it
//!   republishes a copy with `attempts + 1` and an `availableAt` tag
//! - **Pluggable backends**: anything implementing [`PubSubBackend`], with an
//!   in-memory implementation for tests and development
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_pubsub_queue::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> QueueResult<()> {
//! let connector = PubSubConnector::new(MemoryPubSub::factory());
//! let queue = connector.connect(
//!     PubSubConfig::new("my-project")
//!         .with_max_tries(3)
//!         .with_retry_delay(10),
//! )?;
//! queue.declare(Some("emails")).await?;
//!
//! queue.push("SendEmail", json!({"to": "a@b.c"}), Some("emails")).await?;
//!
//! if let Some(mut job) = queue.pop(Some("emails")).await? {
//!     assert_eq!(job.attempts(), 1);
//!     job.release(10).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backend;
pub mod codec;
pub mod config;
pub mod connector;
pub mod error;
pub mod job;
pub mod observability;
pub mod queue;
pub mod types;

pub use adapter::{PubSubQueue, SIZE_PROBE_LIMIT};
pub use backend::{BackendFactory, ClientSettings, PubSubBackend};
pub use codec::json::JsonCodec;
pub use codec::EnvelopeCodec;
pub use config::PubSubConfig;
pub use connector::PubSubConnector;
pub use error::{QueueError, QueueResult};
pub use job::{Job, JobHandle};
pub use queue::Queue;
pub use types::{
    BackendCapabilities, Delay, EnvelopeFields, JobEnvelope, JobId, MessageAttributes, MessageId,
    PublishReceipt, QueueCtx, RawAttributes, ReceivedMessage,
};

pub use observability::{LiveMetrics, MetricsSnapshot};

#[cfg(feature = "tracing-basic")]
pub use observability::init_tracing;

#[cfg(feature = "memory")]
pub use backend::memory::MemoryPubSub;

/// Common imports for queue producers and workers
pub mod prelude {
    pub use crate::{
        Delay, Job, JobEnvelope, JobHandle, PubSubConfig, PubSubConnector, PubSubQueue, Queue,
        QueueError, QueueResult,
    };

    pub use crate::{EnvelopeCodec, JsonCodec, PubSubBackend};

    #[cfg(feature = "memory")]
    pub use crate::MemoryPubSub;

    pub use async_trait::async_trait;
}
