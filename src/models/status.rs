use serde::{Deserialize, Serialize};

use crate::alert::AlertLevel;

/// Identifier of a child profile as known to the settings service.
pub type ChildId = u64;

/// `screentime_id` value the backend uses when no session record exists.
pub const NO_SESSION: u64 = 0;

/// Canonical session record as reported by the backend. Authoritative over
/// any locally projected value whenever a fetch succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenTimeStatus {
    pub screentime_id: u64,
    pub is_active: bool,
    pub elapsed_seconds: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub alert_level: AlertLevel,
}

impl ScreenTimeStatus {
    pub fn has_session(&self) -> bool {
        self.screentime_id != NO_SESSION
    }
}

/// Body for the start and end endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub child_id: ChildId,
}

/// Subset of the settings record used to resolve the default child when the
/// surface has none selected. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildSettings {
    #[serde(default)]
    pub child_id: Option<ChildId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_backend_shape() {
        let raw = r#"{
            "screentime_id": 42,
            "is_active": true,
            "elapsed_seconds": 605,
            "message": "time for a break soon",
            "alert_level": 1
        }"#;
        let status: ScreenTimeStatus = serde_json::from_str(raw).unwrap();
        assert!(status.has_session());
        assert!(status.is_active);
        assert_eq!(status.elapsed_seconds, 605);
        assert_eq!(status.alert_level, AlertLevel::Caution);
    }

    #[test]
    fn status_tolerates_missing_optional_fields() {
        let raw = r#"{"screentime_id": 0, "is_active": false, "elapsed_seconds": 0}"#;
        let status: ScreenTimeStatus = serde_json::from_str(raw).unwrap();
        assert!(!status.has_session());
        assert_eq!(status.alert_level, AlertLevel::Ok);
        assert!(status.message.is_empty());
    }

    #[test]
    fn settings_without_child_resolves_to_none() {
        let settings: ChildSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.child_id, None);
    }
}
