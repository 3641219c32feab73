use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Timelike};

/// A source of the current local time.
///
/// The pipeline asks the clock instead of calling `Local::now()` directly so the
/// message send time can be pinned in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Computes when a delayed message should go out.
///
/// The time is truncated to the minute and then moved forward by
/// `delay_minutes`, rolling over into the next hour or day as needed:
/// 10:05:42 with a two minute delay gives 10:07:00.
pub fn send_time(now: NaiveDateTime, delay_minutes: i64) -> NaiveDateTime {
    let minute = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    minute + TimeDelta::minutes(delay_minutes)
}

/// 距離 `at` 還要等多久，時間已過則為零
pub fn wait_until(at: NaiveDateTime, now: NaiveDateTime) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
