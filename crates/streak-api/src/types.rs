//! Shared types for the streakd API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use streak_util::{ActivityId, UserId};
use thiserror::Error;

/// Which run of consecutive activity days to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    /// Run ending today or yesterday; the first gap ends it
    #[default]
    Current,
    /// Best run anywhere in the user's history
    Longest,
}

impl StreakKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakKind::Current => "current",
            StreakKind::Longest => "longest",
        }
    }
}

impl fmt::Display for StreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown streak kind '{0}' (expected 'current' or 'longest')")]
pub struct UnknownStreakKind(pub String);

impl FromStr for StreakKind {
    type Err = UnknownStreakKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(StreakKind::Current),
            "longest" => Ok(StreakKind::Longest),
            other => Err(UnknownStreakKind(other.to_string())),
        }
    }
}

/// Streak length in days for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStreak {
    pub user_id: UserId,
    pub days: u32,
}

/// One logged exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub user_id: UserId,
    /// Exercise performed (e.g. "push-up")
    pub kind: String,
    /// Number of repetitions
    pub amount: i64,
    /// Game the activity was earned in
    pub game: String,
    /// When the activity was logged
    pub timedate: DateTime<Utc>,
}

/// Total amount logged for one exercise kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotal {
    pub kind: String,
    pub amount: i64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_healthy: bool,
    pub mock_time: bool,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Front-end - can read streaks and log or delete activities
    Shell,
    /// Local admin - can also reload config
    Admin,
    /// Read-only observer
    Observer,
}

impl ClientRole {
    pub fn can_write(&self) -> bool {
        matches!(self, ClientRole::Shell | ClientRole::Admin)
    }

    pub fn can_reload_config(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}
