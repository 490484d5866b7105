//! SQLite-based store implementation

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use streak_api::{Activity, KindTotal};
use streak_util::{ActivityId, UserId, format_day};
use tracing::{debug, warn};

use crate::{ActivityStore, NewActivity, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

type ActivityRow = (i64, String, String, i64, String, String);

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- One row per logged exercise; timedate is RFC 3339 UTC
            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount INTEGER NOT NULL,
                game TEXT NOT NULL,
                timedate TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activities_user_time
                ON activities(user_id, timedate);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn activity_from_row(row: ActivityRow) -> StoreResult<Activity> {
    let (id, user_id, kind, amount, game, timedate) = row;

    let user_id = user_id
        .parse::<UserId>()
        .map_err(|e| StoreError::InvalidData(format!("activity {}: {}", id, e)))?;
    let timedate = DateTime::parse_from_rfc3339(&timedate)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("activity {} timedate '{}': {}", id, timedate, e)))?;

    Ok(Activity {
        id: ActivityId::new(id),
        user_id,
        kind,
        amount,
        game,
        timedate,
    })
}

impl ActivityStore for SqliteStore {
    fn insert_activity(&self, activity: NewActivity) -> StoreResult<Activity> {
        activity.validate()?;

        let conn = self.conn()?;
        let timedate = activity.timedate.to_rfc3339_opts(SecondsFormat::Millis, true);

        conn.execute(
            "INSERT INTO activities (user_id, kind, amount, game, timedate) VALUES (?, ?, ?, ?, ?)",
            params![
                activity.user_id.to_string(),
                activity.kind,
                activity.amount,
                activity.game,
                timedate
            ],
        )?;

        let id = ActivityId::new(conn.last_insert_rowid());
        debug!(activity_id = %id, user_id = %activity.user_id, kind = %activity.kind, "Activity inserted");

        Ok(Activity {
            id,
            user_id: activity.user_id,
            kind: activity.kind,
            amount: activity.amount,
            game: activity.game,
            timedate: activity.timedate,
        })
    }

    fn list_activities(
        &self,
        user_ids: &[UserId],
        limit: u32,
        offset: u32,
    ) -> StoreResult<Vec<Activity>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;

        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, user_id, kind, amount, game, timedate FROM activities \
             WHERE user_id IN ({}) ORDER BY timedate DESC, id DESC LIMIT ? OFFSET ?",
            placeholders
        );

        let mut values: Vec<Value> = user_ids
            .iter()
            .map(|id| Value::Text(id.to_string()))
            .collect();
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;

        let mut activities = Vec::new();
        for row in rows {
            activities.push(activity_from_row(row?)?);
        }

        Ok(activities)
    }

    fn delete_activity(&self, id: ActivityId, user_id: UserId) -> StoreResult<()> {
        let conn = self.conn()?;

        let deleted = conn.execute(
            "DELETE FROM activities WHERE id = ? AND user_id = ?",
            params![id.get(), user_id.to_string()],
        )?;

        if deleted == 0 {
            return Err(StoreError::NotFound(format!(
                "no activity {} for user {}",
                id, user_id
            )));
        }

        debug!(activity_id = %id, user_id = %user_id, "Activity deleted");
        Ok(())
    }

    fn total_amounts(&self, user_id: UserId) -> StoreResult<Vec<KindTotal>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT kind, SUM(amount) FROM activities WHERE user_id = ? GROUP BY kind ORDER BY kind",
        )?;

        let rows = stmt.query_map([user_id.to_string()], |row| {
            Ok(KindTotal {
                kind: row.get(0)?,
                amount: row.get(1)?,
            })
        })?;

        let totals = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    // Compared as DATE(...), so all of `after` is excluded, not just its midnight
    fn list_activity_days(&self, user_id: UserId, after: NaiveDate) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT DATE(timedate) AS day
            FROM activities
            WHERE user_id = ? AND timedate IS NOT NULL AND DATE(timedate) > ?
            ORDER BY day DESC
            "#,
        )?;

        let rows = stmt.query_map(params![user_id.to_string(), format_day(after)], |row| {
            row.get::<_, Option<String>>(0)
        })?;

        let mut days = Vec::new();
        for row in rows {
            match row? {
                Some(day) => days.push(day),
                // DATE() yields NULL for timestamps SQLite cannot read
                None => warn!(user_id = %user_id, "Skipping activity with unreadable timedate"),
            }
        }

        debug!(user_id = %user_id, day_count = days.len(), "Activity days loaded");
        Ok(days)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
