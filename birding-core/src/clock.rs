//! Clock sources for freshness checks.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A wall-clock reading, as time elapsed since the UNIX epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// System wall clock that never reports a reading earlier than one it has
/// already reported.
#[derive(Debug, Default)]
pub struct SystemClock {
    high_water_nanos: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        let reading = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let nanos = u64::try_from(reading.as_nanos()).unwrap_or(u64::MAX);
        let previous = self.high_water_nanos.fetch_max(nanos, Ordering::Relaxed);
        Duration::from_nanos(previous.max(nanos))
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give
/// another to the shelf under test.
///
/// # Example
///
/// ```rust
/// use birding_core::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::at(Duration::from_secs(100));
/// let handle = clock.clone();
/// handle.advance(Duration::from_secs(5));
///
/// assert_eq!(clock.now(), Duration::from_secs(105));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock reading `now`.
    pub fn at(now: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Sets the reading.
    pub fn set(&self, now: Duration) {
        *self.now.lock() = now;
    }

    /// Moves the reading forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.saturating_add(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_epoch() {
        let clock = SystemClock::new();
        assert!(clock.now() > Duration::from_secs(1_400_000_000));
    }

    #[test]
    fn test_system_clock_non_decreasing() {
        let clock = SystemClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_manual_clock_defaults_to_zero() {
        assert_eq!(ManualClock::default().now(), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::at(Duration::from_secs(10));
        let other = clock.clone();

        other.advance(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(12));

        clock.set(Duration::from_secs(1));
        assert_eq!(other.now(), Duration::from_secs(1));
    }
}
