//! Calendar events.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::InvalidInputError;

/// A scheduled event.
///
/// The list endpoint returns a reduced shape, so the fields it omits are
/// optional here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Category id.
    pub category: i64,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub category_priority: Option<i32>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    /// Whether the scheduler may move this event.
    pub is_flexible: bool,
    pub is_completed: bool,
    #[serde(default)]
    pub google_calendar_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// True if the event shares any time with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub category: i64,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub is_flexible: bool,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        category: i64,
        start_time: DateTime<FixedOffset>,
        end_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category,
            start_time,
            end_time,
            is_flexible: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn fixed(mut self) -> Self {
        self.is_flexible = false;
        self
    }

    /// Reject inputs the backend would refuse.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        if self.title.trim().is_empty() {
            return Err(InvalidInputError::Missing { field: "Title" });
        }
        check_range(self.start_time, self.end_time)
    }
}

/// A partial event update for PATCH. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_flexible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl EventPatch {
    /// Mark an event done.
    pub fn completed() -> Self {
        Self {
            is_completed: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks the time range when both ends are being changed.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => check_range(start, end),
            _ => Ok(()),
        }
    }
}

/// Filters for listing events.
///
/// With both bounds set, the backend returns events that intersect the
/// range. `priority` is a minimum category priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub category: Option<i64>,
    pub priority: Option<i32>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
    }

    pub fn category(mut self, category: i64) -> Self {
        self.category = Some(category);
        self
    }

    pub fn min_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Query string pairs, omitting unset filters.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(start) = self.start_date {
            pairs.push(("start_date", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", end.to_rfc3339()));
        }
        if let Some(category) = self.category {
            pairs.push(("category", category.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.to_string()));
        }
        pairs
    }
}

fn check_range(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Result<(), InvalidInputError> {
    if end <= start {
        return Err(InvalidInputError::Other {
            message: "End time must be after start time.".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn deserializes_list_shape() {
        let event: Event = serde_json::from_value(json!({
            "id": 12,
            "title": "Database exam",
            "category": 1,
            "category_name": "Exam",
            "category_priority": 5,
            "start_time": "2025-11-03T09:00:00+06:00",
            "end_time": "2025-11-03T11:00:00+06:00",
            "is_flexible": false,
            "is_completed": false
        }))
        .unwrap();
        assert_eq!(event.duration(), Duration::hours(2));
        assert!(event.description.is_none());
        assert!(event.created_at.is_none());
    }

    #[test]
    fn overlap_is_half_open() {
        let event: Event = serde_json::from_value(json!({
            "id": 1, "title": "Study", "category": 2,
            "start_time": "2025-11-03T09:00:00Z", "end_time": "2025-11-03T10:00:00Z",
            "is_flexible": true, "is_completed": false
        }))
        .unwrap();
        assert!(event.overlaps(at("2025-11-03T09:30:00Z"), at("2025-11-03T12:00:00Z")));
        assert!(!event.overlaps(at("2025-11-03T10:00:00Z"), at("2025-11-03T11:00:00Z")));
    }

    #[test]
    fn new_event_rejects_inverted_range() {
        let event = NewEvent::new(
            "Gym",
            4,
            at("2025-11-03T10:00:00Z"),
            at("2025-11-03T09:00:00Z"),
        );
        let err = event.validate().unwrap_err();
        assert_eq!(err.to_string(), "End time must be after start time.");
    }

    #[test]
    fn new_event_serializes_without_empty_description() {
        let event = NewEvent::new(
            "Gym",
            4,
            at("2025-11-03T09:00:00Z"),
            at("2025-11-03T10:00:00Z"),
        )
        .fixed();
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["is_flexible"], json!(false));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = EventPatch::completed();
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"is_completed": true})
        );
        assert!(EventPatch::default().is_empty());
    }

    #[test]
    fn query_pairs_skip_unset_filters() {
        let query = EventQuery::between(at("2025-11-01T00:00:00Z"), at("2025-12-01T00:00:00Z"))
            .min_priority(3);
        let pairs = query.to_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ("start_date", "2025-11-01T00:00:00+00:00".to_string()));
        assert_eq!(pairs[2], ("priority", "3".to_string()));
        assert!(EventQuery::new().to_pairs().is_empty());
    }
}
