//! Exponential cooldown growth for repeated circuit trips.

use std::time::Duration;

/// Cooldown before the breaker may probe again after its `trip`-th
/// consecutive opening.
///
/// The first trip waits `base_ms`; each further trip without a recovery
/// doubles the wait, capped at `max_ms`. No jitter: there is exactly one
/// poller per device, so there is no herd to spread out.
pub fn cooldown_for_trip(trip: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = trip.saturating_sub(1).min(63);
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(max_ms);
    Duration::from_millis(delay_ms)
}
