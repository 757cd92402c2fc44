//! Time sources for ageing pending transactions.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Horizon used for timers whose deadline would overflow.
pub const MAX_TIMER: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A millisecond wall clock.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// Returns the instant `after` from now, saturating instead of overflowing.
pub fn deadline(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(MAX_TIMER))
        .unwrap_or(now)
}

#[cfg(test)]
pub use self::manual::ManualClock;
