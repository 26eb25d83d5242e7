// Event domain types
//
// These types represent the Event entity and the inputs used to create
// and update it. Used by both the store and the API crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::datetime::serde_iso;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Identifier of a stored event. Assigned sequentially starting at 1.
pub type EventId = u64;

/// Event - a single scheduled entry in the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    /// Unique identifier for the event.
    pub id: EventId,
    /// Human-readable title. Never empty.
    pub title: String,
    /// Free-form description. Empty when not provided.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// When the event starts. Always before `end_time`.
    #[serde(with = "serde_iso")]
    pub start_time: DateTime<Utc>,
    /// When the event ends.
    #[serde(with = "serde_iso")]
    pub end_time: DateTime<Utc>,
    /// Recurrence rule, stored verbatim and never interpreted.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub recurring: Value,
    /// Timestamp when the event was created.
    #[serde(with = "serde_iso")]
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful update.
    #[serde(
        default,
        with = "serde_iso::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating an event. Times are raw text; the store parses and
/// validates them.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub recurring: Value,
}

/// Partial update for an event. `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    /// Applied only when present and non-empty.
    pub title: Option<String>,
    /// Applied when present; an empty string clears the description.
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// `Some(Value::Null)` explicitly clears the recurrence.
    pub recurring: Option<Value>,
}

/// An event that starts within the reminder window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Reminder {
    /// The upcoming event.
    pub event: Event,
    /// Whole minutes until the event starts (truncated).
    pub minutes_until: i64,
}

/// Ordering applied by [`crate::EventStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Ascending by start time.
    #[default]
    StartTime,
    /// Ascending by end time.
    EndTime,
    /// Ascending by creation time.
    CreatedAt,
    /// Case-insensitive alphabetical by title.
    Title,
    /// Insertion order (ascending id).
    Insertion,
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::StartTime => write!(f, "start_time"),
            SortKey::EndTime => write!(f, "end_time"),
            SortKey::CreatedAt => write!(f, "created_at"),
            SortKey::Title => write!(f, "title"),
            SortKey::Insertion => write!(f, "id"),
        }
    }
}

/// Unrecognized keys fall back to insertion order rather than erroring.
impl From<&str> for SortKey {
    fn from(s: &str) -> Self {
        match s {
            "start_time" => SortKey::StartTime,
            "end_time" => SortKey::EndTime,
            "created_at" => SortKey::CreatedAt,
            "title" => SortKey::Title,
            _ => SortKey::Insertion,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_event() -> Event {
        Event {
            id: 7,
            title: "Team Sync".to_string(),
            description: "weekly".to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(),
            recurring: json!("weekly"),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn test_event_json_shape() {
        let value = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["start_time"], "2024-01-15T10:00:00Z");
        assert_eq!(value["recurring"], "weekly");
        assert!(value.get("updated_at").is_none());
    }

    #[test]
    fn test_event_reads_offsetless_timestamps() {
        let event: Event = serde_json::from_value(json!({
            "id": 1,
            "title": "Legacy",
            "description": null,
            "start_time": "2024-01-15T10:00:00",
            "end_time": "2024-01-15 11:00:00",
            "recurring": null,
            "created_at": "2024-01-01T08:00:00.123456"
        }))
        .unwrap();

        assert_eq!(event.description, "");
        assert_eq!(event.recurring, Value::Null);
        assert_eq!(
            event.end_time,
            Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap()
        );
        assert!(event.updated_at.is_none());
    }

    #[test]
    fn test_sort_key_from_str() {
        assert_eq!(SortKey::from("start_time"), SortKey::StartTime);
        assert_eq!(SortKey::from("title"), SortKey::Title);
        assert_eq!(SortKey::from("priority"), SortKey::Insertion);
        assert_eq!(SortKey::default(), SortKey::StartTime);
    }
}
