//! Clock abstraction
//!
//! Every expiry decision in the core (invite TTL, session freshness, the
//! post-end grace window) goes through an injected [`Clock`] rather than
//! calling `Utc::now()` directly, so time-dependent behavior is deterministic
//! under test.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system time. The default clock for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-advanced clock for tests.
///
/// Second resolution: the core never compares instants finer than that.
#[derive(Debug)]
pub struct ManualClock {
    epoch_secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            epoch_secs: AtomicI64::new(start.timestamp()),
        }
    }

    /// A clock starting at the Unix epoch, for timeline tests that count
    /// seconds from t=0.
    pub fn at_epoch() -> Self {
        Self {
            epoch_secs: AtomicI64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.epoch_secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.epoch_secs.store(to.timestamp(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.epoch_secs.load(Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        assert_eq!(clock.now().timestamp(), 0);

        clock.advance(Duration::seconds(1000));
        assert_eq!(clock.now().timestamp(), 1000);

        clock.advance(Duration::seconds(600));
        assert_eq!(clock.now().timestamp(), 1600);
    }

    #[test]
    fn manual_clock_set() {
        let clock = ManualClock::at_epoch();
        let target = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
