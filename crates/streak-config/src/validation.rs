//! Configuration validation

use crate::schema::RawConfig;
use chrono::NaiveDate;
use streak_util::DAY_FORMAT;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid date '{value}' for {field}: expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} cannot be empty")]
    EmptyPath { field: &'static str },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(path) = &config.service.socket_path
        && path.as_os_str().is_empty()
    {
        errors.push(ValidationError::EmptyPath {
            field: "service.socket_path",
        });
    }

    if let Some(path) = &config.service.data_dir
        && path.as_os_str().is_empty()
    {
        errors.push(ValidationError::EmptyPath {
            field: "service.data_dir",
        });
    }

    if let Some(day) = &config.streaks.earliest_activity
        && parse_day(day).is_err()
    {
        errors.push(ValidationError::InvalidDate {
            field: "streaks.earliest_activity",
            value: day.clone(),
        });
    }

    if config.rate_limit.max_requests == Some(0) {
        errors.push(ValidationError::NotPositive {
            field: "rate_limit.max_requests",
        });
    }

    if config.rate_limit.window_seconds == Some(0) {
        errors.push(ValidationError::NotPositive {
            field: "rate_limit.window_seconds",
        });
    }

    errors
}

/// Parse a `YYYY-MM-DD` day
pub fn parse_day(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
}
