//! Event types for streakd -> client streaming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streak_util::{ActivityId, UserId};

use crate::{Activity, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp,
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// An activity was logged; the user's streaks may have changed
    ActivityRecorded { activity: Activity },

    /// An activity was removed
    ActivityDeleted { id: ActivityId, user_id: UserId },

    /// Configuration was reloaded
    ConfigReloaded,

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_serialization() {
        let at = Utc.with_ymd_and_hms(2023, 1, 6, 12, 0, 0).unwrap();
        let event = Event::new(
            at,
            EventPayload::ActivityDeleted {
                id: ActivityId::new(4),
                user_id: UserId::new(8),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "activity_deleted");
        assert_eq!(json["payload"]["user_id"], "8");

        let parsed: Event = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.timestamp, at);
    }
}
