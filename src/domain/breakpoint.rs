//! A single suspension point within an [`Event`](super::event::Event).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One place an agent program can be paused, edited, and released.
///
/// `original_data` is whatever the agent sent; `modified_data`, once set by the UI,
/// takes precedence. Equality is by `id` alone — two breakpoints with identical
/// payloads but different ids are distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: Uuid,
    pub agent_name: String,
    pub event_id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub summary: Option<String>,
    pub original_data: Value,
    pub modified_data: Option<Value>,
}

impl Breakpoint {
    /// Canonical constructor order: `(agent_name, data, event_id)`.
    pub fn new(agent_name: impl Into<String>, data: Value, event_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_name: agent_name.into(),
            event_id,
            creation_time: Utc::now(),
            summary: None,
            original_data: data,
            modified_data: None,
        }
    }

    /// The payload the agent should actually see: `modified_data` if present, else
    /// `original_data`.
    pub fn effective_data(&self) -> &Value {
        self.modified_data.as_ref().unwrap_or(&self.original_data)
    }

    /// Whether this breakpoint's original payload is a JSON object (maps to
    /// `ContentType::Json` in the UI projection; everything else is `Text`).
    pub fn is_structured(&self) -> bool {
        self.original_data.is_object()
    }
}

impl PartialEq for Breakpoint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Breakpoint {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_data_prefers_modified() {
        let mut bp = Breakpoint::new("agent", Value::String("hi".into()), Uuid::new_v4());
        assert_eq!(bp.effective_data(), &Value::String("hi".into()));
        bp.modified_data = Some(Value::String("hello".into()));
        assert_eq!(bp.effective_data(), &Value::String("hello".into()));
    }

    #[test]
    fn equality_is_by_id_only() {
        let event_id = Uuid::new_v4();
        let a = Breakpoint::new("agent", Value::Null, event_id);
        let mut b = a.clone();
        b.summary = Some("different".into());
        assert_eq!(a, b);
        let c = Breakpoint::new("agent", Value::Null, event_id);
        assert_ne!(a, c);
    }

    #[test]
    fn structured_payload_is_object_only() {
        let obj = Breakpoint::new("a", serde_json::json!({"k": 1}), Uuid::new_v4());
        assert!(obj.is_structured());
        let arr = Breakpoint::new("a", serde_json::json!([1, 2]), Uuid::new_v4());
        assert!(!arr.is_structured());
        let text = Breakpoint::new("a", Value::String("hi".into()), Uuid::new_v4());
        assert!(!text.is_structured());
    }
}
