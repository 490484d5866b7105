//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service paths
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Streak computation options
    #[serde(default)]
    pub streaks: RawStreakConfig,

    /// Per-client request limits
    #[serde(default)]
    pub rate_limit: RawRateLimit,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the activity database
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStreakConfig {
    /// Activities logged on or before this day (YYYY-MM-DD) are ignored
    pub earliest_activity: Option<String>,

    /// Reject activity-day lists that are not strictly descending
    pub strict_ordering: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRateLimit {
    /// Requests allowed per window
    pub max_requests: Option<u32>,

    /// Window length in seconds
    pub window_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [service]
            socket_path = "/run/streakd/streakd.sock"
            data_dir = "/var/lib/streakd"

            [streaks]
            earliest_activity = "2010-06-01"
            strict_ordering = false

            [rate_limit]
            max_requests = 100
            window_seconds = 10
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.service.data_dir,
            Some(PathBuf::from("/var/lib/streakd"))
        );
        assert_eq!(config.streaks.earliest_activity.as_deref(), Some("2010-06-01"));
        assert_eq!(config.streaks.strict_ordering, Some(false));
        assert_eq!(config.rate_limit.window_seconds, Some(10));
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.service.socket_path.is_none());
        assert!(config.streaks.earliest_activity.is_none());
        assert!(config.rate_limit.max_requests.is_none());
    }
}
