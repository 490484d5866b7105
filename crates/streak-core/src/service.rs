//! Streak service: the store, the clock and the calculator put together

use chrono::NaiveDate;
use std::sync::Arc;
use streak_api::{Activity, DayStreak, KindTotal, StreakKind};
use streak_store::{ActivityStore, NewActivity, StoreError};
use streak_util::{ActivityId, Clock, StreakError, UserId};
use tracing::{debug, info, warn};

use crate::calculator::count_streak;
use crate::{ParseError, StreakCalculator, ensure_strictly_descending, parse_activity_dates};

/// Tunables for how stored activity days are read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakOptions {
    /// Days on or before this are ignored
    pub earliest_activity: NaiveDate,
    /// Reject day lists that are not strictly descending
    pub strict_ordering: bool,
}

impl Default for StreakOptions {
    fn default() -> Self {
        Self {
            earliest_activity: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
            strict_ordering: true,
        }
    }
}

/// Streak queries and activity logging for the service
pub struct StreakService {
    store: Arc<dyn ActivityStore>,
    clock: Arc<dyn Clock>,
    calculator: StreakCalculator,
    options: StreakOptions,
}

impl StreakService {
    pub fn new(store: Arc<dyn ActivityStore>, clock: Arc<dyn Clock>, options: StreakOptions) -> Self {
        info!(
            earliest_activity = %options.earliest_activity,
            strict_ordering = options.strict_ordering,
            "Streak service initialized"
        );

        Self {
            store,
            calculator: StreakCalculator::new(clock.clone()),
            clock,
            options,
        }
    }

    pub fn options(&self) -> StreakOptions {
        self.options
    }

    /// Replace options after a config reload
    pub fn set_options(&mut self, options: StreakOptions) {
        info!(
            earliest_activity = %options.earliest_activity,
            strict_ordering = options.strict_ordering,
            "Streak options updated"
        );
        self.options = options;
    }

    pub fn current_streak(&self, user_id: UserId) -> Result<DayStreak, StreakError> {
        self.streak(user_id, StreakKind::Current)
    }

    pub fn longest_streak(&self, user_id: UserId) -> Result<DayStreak, StreakError> {
        self.streak(user_id, StreakKind::Longest)
    }

    pub fn streak(&self, user_id: UserId, kind: StreakKind) -> Result<DayStreak, StreakError> {
        let days = self
            .store
            .list_activity_days(user_id, self.options.earliest_activity)
            .map_err(store_error)?;

        let dates = parse_activity_dates(&days).map_err(|e| {
            warn!(user_id = %user_id, value = %e.value, "Unparseable activity day");
            StreakError::invalid_date(e.value)
        })?;

        if self.options.strict_ordering
            && let Err(violation) = ensure_strictly_descending(&dates)
        {
            warn!(user_id = %user_id, index = violation.index, "Activity days out of order");
            return Err(StreakError::unordered(user_id, violation.to_string()));
        }

        let days = self.calculator.calculate(&dates, kind);
        debug!(user_id = %user_id, kind = %kind, day_count = dates.len(), days, "Streak computed");

        Ok(DayStreak { user_id, days })
    }

    /// Streaks for several users, in input order. The first failure aborts
    /// the batch.
    pub fn streaks(&self, user_ids: &[UserId], kind: StreakKind) -> Result<Vec<DayStreak>, StreakError> {
        user_ids.iter().map(|&id| self.streak(id, kind)).collect()
    }

    /// Log an activity at the current instant of the service clock
    pub fn record_activity(
        &self,
        user_id: UserId,
        kind: impl Into<String>,
        amount: i64,
        game: impl Into<String>,
    ) -> Result<Activity, StreakError> {
        let activity = self
            .store
            .insert_activity(NewActivity {
                user_id,
                kind: kind.into(),
                amount,
                game: game.into(),
                timedate: self.clock.now(),
            })
            .map_err(store_error)?;

        info!(
            activity_id = %activity.id,
            user_id = %user_id,
            kind = %activity.kind,
            amount,
            "Activity recorded"
        );
        Ok(activity)
    }

    pub fn list_activities(
        &self,
        user_ids: &[UserId],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Activity>, StreakError> {
        self.store
            .list_activities(user_ids, limit, offset)
            .map_err(store_error)
    }

    pub fn delete_activity(&self, id: ActivityId, user_id: UserId) -> Result<(), StreakError> {
        self.store.delete_activity(id, user_id).map_err(store_error)?;
        info!(activity_id = %id, user_id = %user_id, "Activity deleted");
        Ok(())
    }

    pub fn totals(&self, user_id: UserId) -> Result<Vec<KindTotal>, StreakError> {
        self.store.total_amounts(user_id).map_err(store_error)
    }

    pub fn is_store_healthy(&self) -> bool {
        self.store.is_healthy()
    }
}

fn store_error(e: StoreError) -> StreakError {
    match e {
        StoreError::NotFound(msg) => StreakError::not_found(msg),
        StoreError::InvalidInput(msg) => StreakError::validation(msg),
        other => StreakError::store(other.to_string()),
    }
}

/// Current streak for already-fetched day strings, most recent first
pub fn compute_current_streak<S: AsRef<str>>(user_dates: &[S], clock: &dyn Clock) -> Result<u32, ParseError> {
    let dates = parse_activity_dates(user_dates)?;
    Ok(count_streak(clock.today(), &dates, StreakKind::Current))
}

/// Longest streak for already-fetched day strings, most recent first
pub fn compute_longest_streak<S: AsRef<str>>(user_dates: &[S], clock: &dyn Clock) -> Result<u32, ParseError> {
    let dates = parse_activity_dates(user_dates)?;
    Ok(count_streak(clock.today(), &dates, StreakKind::Longest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use streak_store::{SqliteStore, StoreResult};
    use streak_util::FixedClock;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    /// Store that hands back canned day lists, for inputs SQL would never produce
    struct CannedDays {
        days: Vec<String>,
    }

    impl CannedDays {
        fn new(days: &[&str]) -> Self {
            Self {
                days: days.iter().map(|d| d.to_string()).collect(),
            }
        }
    }

    impl ActivityStore for CannedDays {
        fn insert_activity(&self, _activity: NewActivity) -> StoreResult<Activity> {
            Err(StoreError::Database("read-only".into()))
        }

        fn list_activities(&self, _: &[UserId], _: u32, _: u32) -> StoreResult<Vec<Activity>> {
            Ok(Vec::new())
        }

        fn delete_activity(&self, id: ActivityId, _: UserId) -> StoreResult<()> {
            Err(StoreError::NotFound(id.to_string()))
        }

        fn total_amounts(&self, _: UserId) -> StoreResult<Vec<KindTotal>> {
            Ok(Vec::new())
        }

        fn list_activity_days(&self, _: UserId, _: NaiveDate) -> StoreResult<Vec<String>> {
            Ok(self.days.clone())
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }

    fn canned(days: &[&str], options: StreakOptions) -> StreakService {
        StreakService::new(
            Arc::new(CannedDays::new(days)),
            Arc::new(FixedClock::new(at(2023, 1, 6, 23))),
            options,
        )
    }

    #[test]
    fn streaks_from_logged_activities() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let user = UserId::new(1);

        // Log one activity per instant through services pinned to that instant
        for when in [
            at(2023, 1, 1, 7),
            at(2023, 1, 2, 7),
            at(2023, 1, 3, 7),
            at(2023, 1, 5, 0),
            at(2023, 1, 5, 23),
            at(2023, 1, 6, 12),
        ] {
            let svc = StreakService::new(store.clone(), Arc::new(FixedClock::new(when)), StreakOptions::default());
            svc.record_activity(user, "push-up", 10, "overwatch").unwrap();
        }

        let svc = StreakService::new(
            store.clone(),
            Arc::new(FixedClock::new(at(2023, 1, 6, 23))),
            StreakOptions::default(),
        );
        assert_eq!(svc.current_streak(user).unwrap(), DayStreak { user_id: user, days: 2 });
        assert_eq!(svc.longest_streak(user).unwrap().days, 3);

        let stranger = UserId::new(2);
        assert_eq!(svc.current_streak(stranger).unwrap().days, 0);
    }

    #[test]
    fn batch_keeps_input_order() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(FixedClock::new(at(2023, 1, 6, 9)));
        let svc = StreakService::new(store, clock, StreakOptions::default());
        svc.record_activity(UserId::new(5), "squat", 3, "valorant").unwrap();

        let result = svc
            .streaks(&[UserId::new(9), UserId::new(5)], StreakKind::Current)
            .unwrap();
        assert_eq!(
            result,
            vec![
                DayStreak { user_id: UserId::new(9), days: 0 },
                DayStreak { user_id: UserId::new(5), days: 1 },
            ]
        );
    }

    #[test]
    fn earliest_activity_cutoff() {
        let svc = StreakService::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(FixedClock::new(at(2000, 1, 1, 12))),
            StreakOptions::default(),
        );
        let user = UserId::new(3);
        svc.record_activity(user, "plank", 30, "overwatch").unwrap();

        // The only activity falls on the cut-off day
        assert_eq!(svc.current_streak(user).unwrap().days, 0);
    }

    #[test]
    fn malformed_day_is_data_integrity_error() {
        let svc = canned(&["2023-01-06", "not-a-day"], StreakOptions::default());
        let err = svc.current_streak(UserId::new(1)).unwrap_err();
        assert!(matches!(err, StreakError::InvalidDate(ref v) if v == "not-a-day"));
        assert!(err.is_data_integrity());
    }

    #[test]
    fn unordered_days_rejected_when_strict() {
        let svc = canned(&["2023-01-05", "2023-01-06"], StreakOptions::default());
        let err = svc.current_streak(UserId::new(1)).unwrap_err();
        assert!(matches!(err, StreakError::UnorderedDays { .. }));
        assert!(err.is_data_integrity());
    }

    #[test]
    fn unordered_days_computed_when_lenient() {
        let options = StreakOptions {
            strict_ordering: false,
            ..StreakOptions::default()
        };
        let svc = canned(&["2023-01-06", "2023-01-06", "2023-01-05"], options);
        assert_eq!(svc.current_streak(UserId::new(1)).unwrap().days, 1);
    }

    #[test]
    fn batch_aborts_on_first_failure() {
        let svc = canned(&["bogus"], StreakOptions::default());
        assert!(svc.streaks(&[UserId::new(1), UserId::new(2)], StreakKind::Longest).is_err());
        assert!(svc.streaks(&[], StreakKind::Longest).unwrap().is_empty());
    }

    #[test]
    fn store_errors_are_mapped() {
        let svc = canned(&[], StreakOptions::default());
        assert!(matches!(
            svc.delete_activity(ActivityId::new(1), UserId::new(1)),
            Err(StreakError::NotFound(_))
        ));
        assert!(matches!(
            svc.record_activity(UserId::new(1), "push-up", 1, "overwatch"),
            Err(StreakError::StoreError(_))
        ));

        let svc = StreakService::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(FixedClock::new(at(2023, 1, 6, 9))),
            StreakOptions::default(),
        );
        assert!(matches!(
            svc.record_activity(UserId::new(1), "push-up", 0, "overwatch"),
            Err(StreakError::ValidationError(_))
        ));
    }

    #[test]
    fn record_stamps_service_clock() {
        let now = at(2023, 1, 6, 23);
        let svc = StreakService::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(FixedClock::new(now)),
            StreakOptions::default(),
        );
        let activity = svc.record_activity(UserId::new(1), "push-up", 20, "overwatch").unwrap();
        assert_eq!(activity.timedate, now);

        let listed = svc.list_activities(&[UserId::new(1)], 10, 0).unwrap();
        assert_eq!(listed, vec![activity.clone()]);

        svc.delete_activity(activity.id, UserId::new(1)).unwrap();
        assert!(svc.totals(UserId::new(1)).unwrap().is_empty());
    }

    #[test]
    fn set_options_applies_to_next_query() {
        let mut svc = canned(&["2023-01-05", "2023-01-06"], StreakOptions::default());
        assert!(svc.current_streak(UserId::new(1)).is_err());

        svc.set_options(StreakOptions {
            strict_ordering: false,
            ..svc.options()
        });
        assert!(svc.current_streak(UserId::new(1)).is_ok());
    }

    #[test]
    fn free_functions() {
        let clock = FixedClock::new(at(2023, 1, 6, 23));
        let days = ["2023-01-06", "2023-01-05", "2023-01-03", "2023-01-02", "2023-01-01"];

        assert_eq!(compute_current_streak(&days, &clock).unwrap(), 2);
        assert_eq!(compute_longest_streak(&days, &clock).unwrap(), 3);

        let none: [String; 0] = [];
        assert_eq!(compute_current_streak(&none, &clock).unwrap(), 0);
        assert_eq!(compute_longest_streak(&none, &clock).unwrap(), 0);

        let err = compute_current_streak(&["2023-1-6"], &clock).unwrap_err();
        assert_eq!(err.value, "2023-1-6");
    }

    #[test]
    fn free_functions_accept_closure_clock() {
        let clock = || at(2023, 1, 10, 0);
        let days = vec!["2023-01-06".to_string(), "2023-01-05".to_string()];
        assert_eq!(compute_current_streak(&days, &clock).unwrap(), 0);
        assert_eq!(compute_longest_streak(&days, &clock).unwrap(), 2);
    }
}
