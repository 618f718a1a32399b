pub mod attributes;
pub mod capabilities;
pub mod ctx;
pub mod delay;
pub mod envelope;
pub mod ids;
pub mod message;

pub use attributes::{MessageAttributes, RawAttributes};
pub use capabilities::BackendCapabilities;
pub use ctx::QueueCtx;
pub use delay::Delay;
pub use envelope::{EnvelopeFields, JobEnvelope};
pub use ids::{JobId, MessageId};
pub use message::{PublishReceipt, ReceivedMessage};
