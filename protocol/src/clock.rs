//! # Time Source
//!
//! Vault expiry and router deadlines both need "now". Reading the wall
//! clock directly would make every lifecycle test depend on real time, so
//! the clock is injected.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Something that can tell the time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Deterministic tests and
/// scenario replays use this.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock forward by `by` and returns the new time. Returns
    /// `None` and leaves the clock alone if the result is out of range.
    pub fn advance(&self, by: Duration) -> Option<DateTime<Utc>> {
        let mut now = self.now.write();
        let moved = now.checked_add_signed(by)?;
        *now = moved;
        Some(moved)
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn out_of_range_advance_leaves_the_clock_alone() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.advance(Duration::MAX), None);
        assert_eq!(clock.now(), start);
        assert_eq!(
            clock.advance(Duration::days(1)),
            Some(start + Duration::days(1))
        );
    }
}
