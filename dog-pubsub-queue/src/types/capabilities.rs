use serde::{Deserialize, Serialize};

/// Backend capabilities - explicit feature detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Backend withholds messages until their `availableAt` time on its own
    pub scheduled_delivery: bool,

    /// Backend can hand a leased message back for immediate redelivery
    pub negative_ack: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            scheduled_delivery: false,
            negative_ack: true,
        }
    }
}

impl BackendCapabilities {
    pub fn all() -> Self {
        Self {
            scheduled_delivery: true,
            negative_ack: true,
        }
    }

    /// Check if a specific feature is supported
    pub fn supports(&self, feature: &str) -> bool {
        match feature {
            "scheduled_delivery" => self.scheduled_delivery,
            "negative_ack" => self.negative_ack,
            _ => false,
        }
    }
}
