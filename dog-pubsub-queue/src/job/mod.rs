pub mod handle;

pub use handle::JobHandle;

use serde::{de::DeserializeOwned, Serialize};

/// Typed job pushed with [`crate::PubSubQueue::dispatch`].
///
/// The job value is serialized into the envelope's `data` field and
/// `JOB_TYPE` becomes its `job` reference.
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Job type identifier for dispatch
    const JOB_TYPE: &'static str;

    /// Attempt ceiling; `None` uses the connection's `max_tries`
    const MAX_TRIES: Option<u32> = None;

    /// Retry backoff in seconds; `None` uses the connection's `retry_delay`
    const RETRY_DELAY: Option<u64> = None;

    /// Name shown in the envelope's `displayName`
    fn display_name(&self) -> String {
        Self::JOB_TYPE.to_string()
    }
}
