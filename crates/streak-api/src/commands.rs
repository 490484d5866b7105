//! Command types for the streakd protocol

use serde::{Deserialize, Serialize};
use streak_util::{ActivityId, ClientId, UserId};

use crate::{Activity, ClientRole, DayStreak, HealthStatus, KindTotal, StreakKind, API_VERSION};

/// Default page size for `ListActivities`
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 50;

/// Largest page the service returns; bigger limits are clamped
pub const MAX_ACTIVITY_LIMIT: u32 = 500;

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    PermissionDenied,
    RateLimited,
    ConfigError,
    StoreError,
    /// Stored activity days could not be parsed or were out of order
    DataIntegrity,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Streak length for each listed user
    GetStreaks {
        user_ids: Vec<UserId>,
        #[serde(default)]
        kind: StreakKind,
    },

    /// Log an exercise for a user, stamped with the service clock
    RecordActivity {
        user_id: UserId,
        kind: String,
        amount: i64,
        game: String,
    },

    /// Activities of the listed users, newest first
    ListActivities {
        user_ids: Vec<UserId>,
        #[serde(default = "default_limit")]
        limit: u32,
        #[serde(default)]
        offset: u32,
    },

    /// Delete an activity; `user_id` must own it
    DeleteActivity { id: ActivityId, user_id: UserId },

    /// Summed amounts per exercise kind for a user
    GetTotals { user_id: UserId },

    /// Reload configuration (admin only)
    ReloadConfig,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

fn default_limit() -> u32 {
    DEFAULT_ACTIVITY_LIMIT
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Streaks { data: Vec<DayStreak> },
    ActivityRecorded(Activity),
    Activities { data: Vec<Activity> },
    ActivityDeleted { id: ActivityId },
    Totals { user_id: UserId, data: Vec<KindTotal> },
    ConfigReloaded,
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}
