//! Error types for streakd

use thiserror::Error;

use crate::UserId;

/// Service-wide error type for streakd operations
#[derive(Debug, Error)]
pub enum StreakError {
    #[error("Invalid activity date: {0}")]
    InvalidDate(String),

    #[error("Activity days for user {user_id} are not strictly descending: {message}")]
    UnorderedDays { user_id: UserId, message: String },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreakError {
    pub fn invalid_date(msg: impl Into<String>) -> Self {
        Self::InvalidDate(msg.into())
    }

    pub fn unordered(user_id: UserId, msg: impl Into<String>) -> Self {
        Self::UnorderedDays {
            user_id,
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error points at corrupt upstream data rather than a bad
    /// request or an unavailable resource.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::InvalidDate(_) | Self::UnorderedDays { .. })
    }
}

pub type Result<T> = std::result::Result<T, StreakError>;
