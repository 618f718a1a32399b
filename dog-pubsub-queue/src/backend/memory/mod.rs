pub mod storage;

pub use storage::{MemoryPubSub, PublishedMessage, DEFAULT_ACK_DEADLINE};
