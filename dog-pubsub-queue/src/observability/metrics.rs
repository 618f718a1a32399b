use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for queue operations
#[derive(Debug, Default)]
pub struct LiveMetrics {
    jobs_pushed: AtomicU64,
    jobs_delayed: AtomicU64,
    jobs_popped: AtomicU64,
    jobs_released: AtomicU64,
    empty_pulls: AtomicU64,
    anomalous_pulls: AtomicU64,
    deferred_deliveries: AtomicU64,
}

/// Point-in-time copy of [`LiveMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_pushed: u64,
    pub jobs_delayed: u64,
    pub jobs_popped: u64,
    pub jobs_released: u64,
    pub empty_pulls: u64,
    pub anomalous_pulls: u64,
    pub deferred_deliveries: u64,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pushed(&self) {
        self.jobs_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delayed(&self) {
        self.jobs_delayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_popped(&self) {
        self.jobs_popped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.jobs_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_pull(&self) {
        self.empty_pulls.fetch_add(1, Ordering::Relaxed);
    }

    /// A pull returned more messages than the single-message contract allows
    pub fn record_anomalous_pull(&self) {
        self.anomalous_pulls.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was pulled before its `availableAt` time and handed back
    pub fn record_deferred(&self) {
        self.deferred_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn jobs_pushed(&self) -> u64 {
        self.jobs_pushed.load(Ordering::Relaxed)
    }

    pub fn jobs_popped(&self) -> u64 {
        self.jobs_popped.load(Ordering::Relaxed)
    }

    pub fn jobs_released(&self) -> u64 {
        self.jobs_released.load(Ordering::Relaxed)
    }

    pub fn anomalous_pulls(&self) -> u64 {
        self.anomalous_pulls.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_pushed: self.jobs_pushed.load(Ordering::Relaxed),
            jobs_delayed: self.jobs_delayed.load(Ordering::Relaxed),
            jobs_popped: self.jobs_popped.load(Ordering::Relaxed),
            jobs_released: self.jobs_released.load(Ordering::Relaxed),
            empty_pulls: self.empty_pulls.load(Ordering::Relaxed),
            anomalous_pulls: self.anomalous_pulls.load(Ordering::Relaxed),
            deferred_deliveries: self.deferred_deliveries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_metrics() {
        let metrics = LiveMetrics::new();

        metrics.record_pushed();
        metrics.record_pushed();
        metrics.record_popped();
        metrics.record_anomalous_pull();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_pushed, 2);
        assert_eq!(snapshot.jobs_popped, 1);
        assert_eq!(snapshot.anomalous_pulls, 1);
        assert_eq!(snapshot.jobs_released, 0);
    }
}
