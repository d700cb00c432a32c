//! Time sources for the delay queue

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// A source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant according to this clock
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Shared behind an `Arc` between a queue and the code driving it, so
/// tests can age messages without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock stopped at `initial`
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    /// Create a manual clock stopped at the current system time
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward and return the new instant
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut current = self.current.lock();
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        if let Some(next) = current.checked_add_signed(delta) {
            *current = next;
        }
        *current
    }

    /// Jump to a specific instant, forwards or backwards
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        let later = clock.advance(Duration::from_millis(40));
        assert_eq!(later - start, chrono::Duration::milliseconds(40));
        assert_eq!(clock.now(), later);

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
