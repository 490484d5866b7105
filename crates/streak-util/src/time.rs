//! Time utilities for streakd
//!
//! Streaks are counted in whole calendar days against a single reference
//! clock (UTC). Everything that needs "now" takes a [`Clock`] instead of
//! reading the system time directly, so the same computation is reproducible
//! given a fixed instant.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `STREAKD_MOCK_TIME` environment variable can be set
//! to shift [`SystemClock`] to another instant. The shifted clock keeps
//! advancing at the real rate.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` interpreted as UTC (e.g., `2023-01-06 23:00:00`)
//!
//! Example:
//! ```bash
//! STREAKD_MOCK_TIME="2023-01-06 23:00:00" streakd
//! ```

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "STREAKD_MOCK_TIME";

/// Textual form of a calendar day as stored and exchanged (`YYYY-MM-DD`)
pub const DAY_FORMAT: &str = "%Y-%m-%d";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match NaiveDateTime::parse_from_str(&raw, MOCK_TIME_FORMAT) {
                Ok(naive) => {
                    let offset = naive.and_utc().signed_duration_since(Utc::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                Err(_) => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time format"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    mock_time_offset().is_some()
}

/// Source of the current instant.
///
/// Any `Fn() -> DateTime<Utc>` closure is a clock, which keeps test setups
/// short:
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use streak_util::Clock;
///
/// let clock = || Utc.with_ymd_and_hms(2023, 1, 6, 23, 0, 0).unwrap();
/// assert_eq!(clock.today().to_string(), "2023-01-06");
/// ```
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The calendar day `now()` falls on, time of day discarded.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock, shifted by `STREAKD_MOCK_TIME` in debug builds
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let real_now = Utc::now();
        match mock_time_offset() {
            Some(offset) => real_now + offset,
            None => real_now,
        }
    }
}

/// Clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Whole calendar days from `earlier` to `later` (negative if `later` is
/// actually before `earlier`).
pub fn days_between(later: NaiveDate, earlier: NaiveDate) -> i64 {
    later.signed_duration_since(earlier).num_days()
}

/// The calendar day `offset` days before `day`.
///
/// Negative offsets move forward. Returns `None` when the result falls
/// outside the representable date range.
pub fn days_before(day: NaiveDate, offset: i64) -> Option<NaiveDate> {
    if offset >= 0 {
        day.checked_sub_days(Days::new(offset.unsigned_abs()))
    } else {
        day.checked_add_days(Days::new(offset.unsigned_abs()))
    }
}

/// Format a day the way it is stored and exchanged (`YYYY-MM-DD`).
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fixed_clock_today_discards_time_of_day() {
        let late = FixedClock::new(Utc.with_ymd_and_hms(2023, 1, 6, 23, 59, 0).unwrap());
        let early = FixedClock::new(Utc.with_ymd_and_hms(2023, 1, 6, 0, 1, 0).unwrap());

        assert_eq!(late.today(), day(2023, 1, 6));
        assert_eq!(late.today(), early.today());
    }

    #[test]
    fn closure_is_a_clock() {
        let instant = Utc.with_ymd_and_hms(2023, 1, 10, 8, 0, 0).unwrap();
        let clock = move || instant;

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.today(), day(2023, 1, 10));
    }

    #[test]
    fn clock_is_object_safe() {
        let clock: Box<dyn Clock> =
            Box::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()));
        assert_eq!(clock.today(), day(2024, 2, 29));
    }

    #[test]
    fn days_between_counts_calendar_days() {
        assert_eq!(days_between(day(2023, 1, 10), day(2023, 1, 6)), 4);
        assert_eq!(days_between(day(2023, 1, 6), day(2023, 1, 6)), 0);
        assert_eq!(days_between(day(2023, 1, 6), day(2023, 1, 7)), -1);
        // Across a leap day and a year boundary
        assert_eq!(days_between(day(2024, 3, 1), day(2024, 2, 28)), 2);
        assert_eq!(days_between(day(2024, 1, 1), day(2023, 12, 31)), 1);
    }

    #[test]
    fn days_before_moves_both_directions() {
        assert_eq!(days_before(day(2023, 1, 6), 1), Some(day(2023, 1, 5)));
        assert_eq!(days_before(day(2023, 1, 1), 1), Some(day(2022, 12, 31)));
        assert_eq!(days_before(day(2023, 1, 6), 0), Some(day(2023, 1, 6)));
        assert_eq!(days_before(day(2023, 1, 6), -2), Some(day(2023, 1, 8)));
        assert_eq!(days_before(NaiveDate::MIN, 1), None);
    }

    #[test]
    fn format_day_is_zero_padded() {
        assert_eq!(format_day(day(2001, 2, 3)), "2001-02-03");
    }

    #[test]
    fn system_clock_returns_plausible_time() {
        let now = SystemClock.now();
        assert!(now.timestamp() > 1_600_000_000);
    }

    #[test]
    fn mock_time_format_parses() {
        assert!(NaiveDateTime::parse_from_str("2023-01-06 23:00:00", MOCK_TIME_FORMAT).is_ok());
        assert!(NaiveDateTime::parse_from_str("2023-01-06T23:00:00", MOCK_TIME_FORMAT).is_err());
        assert!(NaiveDateTime::parse_from_str("2023-01-06", MOCK_TIME_FORMAT).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn is_mock_time_active_does_not_panic() {
        let _ = is_mock_time_active();
    }
}
