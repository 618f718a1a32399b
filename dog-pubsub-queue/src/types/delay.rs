use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// When a delayed job becomes available: relative to now, or at an absolute time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    After(Duration),
    At(DateTime<Utc>),
}

impl Delay {
    pub fn seconds(seconds: u64) -> Self {
        Self::After(Duration::from_secs(seconds))
    }

    /// Absolute availability time, as seen from `now`
    pub fn available_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::After(duration) => chrono::Duration::from_std(*duration)
                .ok()
                .and_then(|offset| now.checked_add_signed(offset))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::At(at) => *at,
        }
    }

    /// Unix timestamp (whole seconds) at which the job becomes available
    pub fn available_at_timestamp(&self, now: DateTime<Utc>) -> i64 {
        self.available_at(now).timestamp()
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl From<DateTime<Utc>> for Delay {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

impl From<u64> for Delay {
    fn from(seconds: u64) -> Self {
        Self::seconds(seconds)
    }
}

/// Parse an `availableAt` attribute value back into a timestamp
pub fn parse_available_at(value: &str) -> Option<DateTime<Utc>> {
    let seconds = value.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_delay() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(Delay::seconds(30).available_at_timestamp(now), 1_700_000_030);
        assert_eq!(Delay::from(0u64).available_at_timestamp(now), 1_700_000_000);
    }

    #[test]
    fn test_absolute_delay_ignores_now() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let at = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        assert_eq!(Delay::from(at).available_at(now), at);
    }

    #[test]
    fn test_parse_available_at() {
        let parsed = parse_available_at("1700000030").unwrap();
        assert_eq!(parsed.timestamp(), 1_700_000_030);
        assert!(parse_available_at("soon").is_none());
    }
}
