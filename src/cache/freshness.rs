//! Consumer-side staleness policy.
//!
//! The cache stores timestamps only. Each reader picks its own threshold:
//! the status reader treats data as stale after 30 s, "now playing" after
//! 60 s. The same record can be fresh for one and stale for the other.

use std::time::Duration;

use serde::Serialize;

/// Threshold used by the cached-status reader.
pub const STATUS_STALE_AFTER: Duration = Duration::from_secs(30);

/// Threshold used by the "now playing" reader.
pub const NOW_PLAYING_STALE_AFTER: Duration = Duration::from_secs(60);

/// Age of a record judged against one consumer's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub age_secs: i64,
    pub is_stale: bool,
    pub stale_after_secs: u64,
}

impl Freshness {
    pub fn assess(age_millis: i64, stale_after: Duration) -> Self {
        let age_millis = age_millis.max(0);
        Self {
            age_secs: age_millis / 1000,
            is_stale: age_millis as u128 > stale_after.as_millis(),
            stale_after_secs: stale_after.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_age_differs_by_consumer() {
        let age = 45_000;
        let status = Freshness::assess(age, STATUS_STALE_AFTER);
        let now_playing = Freshness::assess(age, NOW_PLAYING_STALE_AFTER);

        assert_eq!(status.age_secs, 45);
        assert!(status.is_stale);
        assert_eq!(now_playing.age_secs, 45);
        assert!(!now_playing.is_stale);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(!Freshness::assess(30_000, STATUS_STALE_AFTER).is_stale);
        assert!(Freshness::assess(30_001, STATUS_STALE_AFTER).is_stale);
    }

    #[test]
    fn test_clock_skew_clamps_to_zero() {
        let f = Freshness::assess(-5_000, STATUS_STALE_AFTER);
        assert_eq!(f.age_secs, 0);
        assert!(!f.is_stale);
    }
}
