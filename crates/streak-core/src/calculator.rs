//! Streak calculation over a user's activity days

use chrono::NaiveDate;
use std::ops::ControlFlow;
use std::sync::Arc;
use streak_api::StreakKind;
use streak_util::{Clock, days_before, days_between};
use thiserror::Error;

use crate::ActivityDate;

/// Counts consecutive activity days relative to the clock's current day.
///
/// Input must be strictly descending (most recent first) with no duplicate
/// days. The calculator trusts that ordering and never re-sorts; use
/// [`ensure_strictly_descending`] to check it first.
#[derive(Clone)]
pub struct StreakCalculator {
    clock: Arc<dyn Clock>,
}

impl StreakCalculator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Streak length in days under `kind`, reading the clock once.
    pub fn calculate(&self, dates: &[ActivityDate], kind: StreakKind) -> u32 {
        count_streak(self.clock.today(), dates, kind)
    }
}

/// State carried from one activity day to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Walk {
    /// Length of the run being extended
    streak: u32,
    /// Longest run closed so far
    longest: u32,
    /// Distance from today of the day that would extend the run
    day_offset: i64,
}

impl Walk {
    /// A walk about to look at `first`. Today not being logged yet does not
    /// break the run, so the first expected day is today when it was logged
    /// and yesterday otherwise.
    fn start(today: NaiveDate, first: NaiveDate) -> Self {
        Self {
            streak: 0,
            longest: 0,
            day_offset: if first == today { 0 } else { 1 },
        }
    }

    fn step(self, today: NaiveDate, day: NaiveDate, kind: StreakKind) -> ControlFlow<Self, Self> {
        if days_before(today, self.day_offset) == Some(day) {
            return ControlFlow::Continue(Self {
                streak: self.streak.saturating_add(1),
                day_offset: self.day_offset + 1,
                ..self
            });
        }

        match kind {
            StreakKind::Current => ControlFlow::Break(Self {
                longest: self.streak,
                ..self
            }),
            // A new run starts at `day`
            StreakKind::Longest => ControlFlow::Continue(Self {
                streak: 1,
                longest: self.longest.max(self.streak),
                day_offset: days_between(today, day) + 1,
            }),
        }
    }

    fn finish(self) -> u32 {
        self.longest.max(self.streak)
    }
}

pub(crate) fn count_streak(today: NaiveDate, dates: &[ActivityDate], kind: StreakKind) -> u32 {
    let Some(first) = dates.first() else {
        return 0;
    };

    let walk = dates
        .iter()
        .try_fold(Walk::start(today, first.day()), |walk, date| {
            walk.step(today, date.day(), kind)
        });

    match walk {
        ControlFlow::Continue(walk) | ControlFlow::Break(walk) => walk.finish(),
    }
}

/// Activity days that are not strictly descending
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("activity day {found} at index {index} does not precede {previous}")]
pub struct PreconditionViolation {
    /// Position of the offending day
    pub index: usize,
    pub previous: ActivityDate,
    pub found: ActivityDate,
}

/// Check that `dates` are strictly descending, i.e. sorted most recent first
/// with no day repeated.
pub fn ensure_strictly_descending(dates: &[ActivityDate]) -> Result<(), PreconditionViolation> {
    match dates.windows(2).position(|pair| pair[0] <= pair[1]) {
        Some(i) => Err(PreconditionViolation {
            index: i + 1,
            previous: dates[i],
            found: dates[i + 1],
        }),
        None => Ok(()),
    }
}
