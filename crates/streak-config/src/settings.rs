//! Validated settings structures

use crate::schema::{RawConfig, RawRateLimit, RawServiceConfig, RawStreakConfig};
use crate::validation::parse_day;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use streak_util::{data_dir_without_env, socket_path_without_env};

/// Activities at or before this day are treated as bogus timestamps
pub const DEFAULT_EARLIEST_ACTIVITY: (i32, u32, u32) = (2000, 1, 1);

pub const DEFAULT_MAX_REQUESTS: u32 = 30;
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Validated settings ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub streaks: StreakSettings,
    pub rate_limit: RateLimitSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings::from_raw(raw.service),
            streaks: StreakSettings::from_raw(raw.streaks),
            rate_limit: RateLimitSettings::from_raw(raw.rate_limit),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            socket_path: socket_path_without_env(),
            data_dir: data_dir_without_env(),
        }
    }
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            socket_path: raw.socket_path.unwrap_or(defaults.socket_path),
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreakSettings {
    /// Exclusive lower bound for activity timestamps
    pub earliest_activity: NaiveDate,
    /// Fail instead of computing on unsorted or duplicated day lists
    pub strict_ordering: bool,
}

impl Default for StreakSettings {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_EARLIEST_ACTIVITY;
        Self {
            earliest_activity: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
            strict_ordering: true,
        }
    }
}

impl StreakSettings {
    fn from_raw(raw: RawStreakConfig) -> Self {
        let defaults = Self::default();
        Self {
            earliest_activity: raw
                .earliest_activity
                .as_deref()
                .and_then(|s| parse_day(s).ok())
                .unwrap_or(defaults.earliest_activity),
            strict_ordering: raw.strict_ordering.unwrap_or(defaults.strict_ordering),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_RATE_WINDOW,
        }
    }
}

impl RateLimitSettings {
    fn from_raw(raw: RawRateLimit) -> Self {
        Self {
            max_requests: raw.max_requests.unwrap_or(DEFAULT_MAX_REQUESTS),
            window: raw
                .window_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RATE_WINDOW),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let settings = crate::parse_config("config_version = 1").unwrap();
        assert_eq!(
            settings.streaks.earliest_activity,
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
        );
        assert!(settings.streaks.strict_ordering);
        assert_eq!(settings.rate_limit, RateLimitSettings::default());
        assert!(settings.service.socket_path.to_string_lossy().ends_with("streakd.sock"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let settings = crate::parse_config(
            r#"
            config_version = 1

            [service]
            socket_path = "/tmp/test.sock"

            [streaks]
            earliest_activity = "2015-03-04"

            [rate_limit]
            max_requests = 5
            window_seconds = 60
            "#,
        )
        .unwrap();

        assert_eq!(settings.service.socket_path, PathBuf::from("/tmp/test.sock"));
        assert_eq!(
            settings.streaks.earliest_activity,
            NaiveDate::from_ymd_opt(2015, 3, 4).unwrap()
        );
        assert_eq!(settings.rate_limit.max_requests, 5);
        assert_eq!(settings.rate_limit.window, Duration::from_secs(60));
    }
}
