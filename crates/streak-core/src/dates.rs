//! Calendar-day normalization

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use streak_util::{DAY_FORMAT, format_day};
use thiserror::Error;

/// Length of a `YYYY-MM-DD` day string
const DAY_LEN: usize = 10;

/// A calendar day on which a user logged at least one activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityDate(NaiveDate);

impl ActivityDate {
    pub fn new(day: NaiveDate) -> Self {
        Self(day)
    }

    pub fn day(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for ActivityDate {
    fn from(day: NaiveDate) -> Self {
        Self(day)
    }
}

impl fmt::Display for ActivityDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_day(self.0))
    }
}

impl FromStr for ActivityDate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields, the stored form never has them
        let well_formed = s.len() == DAY_LEN
            && s.bytes().enumerate().all(|(i, b)| match i {
                4 | 7 => b == b'-',
                _ => b.is_ascii_digit(),
            });

        if !well_formed {
            return Err(ParseError::new(s));
        }

        NaiveDate::parse_from_str(s, DAY_FORMAT)
            .map(Self)
            .map_err(|_| ParseError::new(s))
    }
}

/// A day string that is not a valid `YYYY-MM-DD` calendar date
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid activity date '{value}', expected YYYY-MM-DD")]
pub struct ParseError {
    pub value: String,
}

impl ParseError {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// Parse day strings into activity dates, keeping their order.
///
/// Fails on the first malformed entry; nothing is returned for the entries
/// before it.
pub fn parse_activity_dates<S: AsRef<str>>(days: &[S]) -> Result<Vec<ActivityDate>, ParseError> {
    days.iter().map(|day| day.as_ref().parse()).collect()
}
