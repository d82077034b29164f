use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Source name used for events that did not originate from an agent
pub const SYSTEM_SOURCE: &str = "system";

/// Core event structure for the Event Bus
///
/// Immutable once emitted: the bus stores it in history and hands shared
/// references to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// `{source}_{event_type}_{uuid}`
    pub event_id: String,

    /// Global monotonic sequence number assigned by the bus on emit
    pub cursor: u64,

    /// Routing key, e.g. "assessment.completed"
    pub event_type: String,

    /// "system" or the emitting agent's name
    pub source_agent: String,

    /// Restricts delivery to the single subscriber with this name
    pub target_agent: Option<String>,

    /// Subject of the event
    pub user_id: String,

    pub payload: Value,

    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a new broadcast event (cursor will be assigned by the bus)
    pub fn new(
        event_type: impl Into<String>,
        source_agent: impl Into<String>,
        user_id: impl Into<String>,
        payload: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let event_type = event_type.into();
        let source_agent = source_agent.into();
        Self {
            event_id: format!("{}_{}_{}", source_agent, event_type, Uuid::new_v4().simple()),
            cursor: 0,
            event_type,
            source_agent,
            target_agent: None,
            user_id: user_id.into(),
            payload,
            timestamp,
        }
    }

    /// Restrict delivery to one named agent
    pub fn targeted(mut self, target_agent: impl Into<String>) -> Self {
        self.target_agent = Some(target_agent.into());
        self
    }

    /// Decode the payload into a typed struct. `null` decodes as an empty object.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        if self.payload.is_null() {
            return serde_json::from_value(Value::Object(Map::new()));
        }
        T::deserialize(&self.payload)
    }

    /// Hour of day (0-23) and weekday (Monday = 0) of the timestamp.
    pub fn hour_and_weekday(&self) -> (u32, u32) {
        use chrono::{Datelike, Timelike};
        (
            self.timestamp.hour(),
            self.timestamp.weekday().num_days_from_monday(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavericks_protocol::ResumeUploadedData;
    use serde_json::json;

    #[test]
    fn test_event_ids_are_unique() {
        let now = Utc::now();
        let a = Event::new("user.registered", "system", "u1", json!({}), now);
        let b = Event::new("user.registered", "system", "u1", json!({}), now);
        assert_ne!(a.event_id, b.event_id);
        assert!(a.event_id.starts_with("system_user.registered_"));
    }

    #[test]
    fn test_decode_typed_payload() {
        let event = Event::new(
            "resume.uploaded",
            "system",
            "u1",
            json!({"resume_text": "Python"}),
            Utc::now(),
        );
        let data: ResumeUploadedData = event.decode().unwrap();
        assert_eq!(data.resume_text, "Python");

        let empty = Event::new("resume.uploaded", "system", "u1", Value::Null, Utc::now());
        let data: ResumeUploadedData = empty.decode().unwrap();
        assert!(data.resume_text.is_empty());
    }
}
