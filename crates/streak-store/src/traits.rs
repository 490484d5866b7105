//! Store trait definitions

use chrono::{DateTime, NaiveDate, Utc};
use streak_api::{Activity, KindTotal};
use streak_util::{ActivityId, UserId};

use crate::{StoreError, StoreResult};

/// Persistence for logged activities
pub trait ActivityStore: Send + Sync {
    // Activity log

    /// Insert an activity and return it with its assigned ID
    fn insert_activity(&self, activity: NewActivity) -> StoreResult<Activity>;

    /// Activities of any of the given users, newest first
    fn list_activities(
        &self,
        user_ids: &[UserId],
        limit: u32,
        offset: u32,
    ) -> StoreResult<Vec<Activity>>;

    /// Delete an activity. Both `id` and `user_id` must match.
    fn delete_activity(&self, id: ActivityId, user_id: UserId) -> StoreResult<()>;

    /// Summed amounts per exercise kind, ordered by kind
    fn total_amounts(&self, user_id: UserId) -> StoreResult<Vec<KindTotal>>;

    // Streak input

    /// Distinct calendar days (`YYYY-MM-DD`, UTC) with at least one activity,
    /// newest first. Days on or before `after` are left out.
    ///
    /// The cut-off compares calendar days, not timestamps: an activity logged
    /// at any time on `after` itself is excluded.
    fn list_activity_days(&self, user_id: UserId, after: NaiveDate) -> StoreResult<Vec<String>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// An activity to be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub user_id: UserId,
    pub kind: String,
    pub amount: i64,
    pub game: String,
    pub timedate: DateTime<Utc>,
}

impl NewActivity {
    /// Reject blank kinds/games and non-positive amounts
    pub fn validate(&self) -> StoreResult<()> {
        if self.kind.trim().is_empty() {
            return Err(StoreError::InvalidInput("kind cannot be empty".into()));
        }
        if self.game.trim().is_empty() {
            return Err(StoreError::InvalidInput("game cannot be empty".into()));
        }
        if self.amount <= 0 {
            return Err(StoreError::InvalidInput(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}
