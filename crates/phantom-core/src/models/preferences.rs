//! Per-user preferences.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// IANA timezone name, e.g. `Asia/Dhaka`.
    pub timezone: String,
    /// Length in minutes given to events created without an end time.
    pub default_event_duration: u32,
}

/// A partial preferences update. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreferencesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_event_duration: Option<u32>,
}

impl PreferencesPatch {
    pub fn is_empty(&self) -> bool {
        self.timezone.is_none() && self.default_event_duration.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = PreferencesPatch {
            timezone: Some("Europe/Oslo".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"timezone": "Europe/Oslo"})
        );
        assert!(!patch.is_empty());
        assert!(PreferencesPatch::default().is_empty());
    }
}
