//! Injectable time source so draw dates, streaks, and quest weeks are
//! pinnable under test.

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now(&self) -> i64;

    /// Current UTC calendar date.
    fn today(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp(self.now(), 0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Fixed time source for deterministic tests.
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_date() {
        // 2024-03-10 is a Sunday.
        let clock = FixedClock(1_710_028_800);
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
    }
}
