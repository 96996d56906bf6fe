//! Clock abstraction for determinism.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time shifted into the community's local offset.
    fn local_now(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.now().with_timezone(&offset)
    }

    /// Returns the local calendar date, which is what daily limits and daily
    /// quests are keyed on.
    fn today(&self, offset: FixedOffset) -> NaiveDate {
        self.local_now(offset).date_naive()
    }
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
