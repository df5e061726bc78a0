//! Agent↔Core message envelope (§4.1, §6).
//!
//! `{"message": "event"|"breakpoint"|"commit", "data": <payload>}`. Decoding
//! fails with [`CoordinatorError::MalformedMessage`] on unknown kind, missing
//! `data`, or a JSON error.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::change::{Change, ChangeKind};
use crate::domain::commit::Commit;
use crate::domain::event::{Event, EventKind};
use crate::domain::{breakpoint::Breakpoint};
use crate::error::CoordinatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBreakpoint {
    pub uuid: Uuid,
    pub agent: String,
    pub event_id: Uuid,
    pub time: i64,
    pub original_data: Value,
    #[serde(default)]
    pub modified_data: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub time: i64,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub breakpoints: Vec<WireBreakpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChange {
    pub path: String,
    pub change_type: ChangeKind,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub previous_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCommit {
    pub id: String,
    pub date: i64,
    pub title: String,
    pub changes: Vec<WireChange>,
}

/// The agent-facing envelope. `message`/`data` tag-and-content matches the
/// wire shape exactly via serde's internal `tag = "message", content = "data"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", content = "data", rename_all = "snake_case")]
pub enum AgentEnvelope {
    Event(WireEvent),
    Breakpoint(WireBreakpoint),
    Commit(WireCommit),
}

pub(crate) fn unix_to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

pub fn decode_agent_message(text: &str) -> Result<AgentEnvelope, CoordinatorError> {
    serde_json::from_str(text).map_err(|e| CoordinatorError::MalformedMessage(e.to_string()))
}

pub fn encode_breakpoint_release(bp: &Breakpoint) -> String {
    let wire = WireBreakpoint::from(bp);
    let envelope = AgentEnvelope::Breakpoint(wire);
    serde_json::to_string(&envelope).expect("breakpoint release serializes to JSON")
}

impl From<&Breakpoint> for WireBreakpoint {
    fn from(bp: &Breakpoint) -> Self {
        Self {
            uuid: bp.id,
            agent: bp.agent_name.clone(),
            event_id: bp.event_id,
            time: bp.creation_time.timestamp(),
            original_data: bp.original_data.clone(),
            modified_data: bp.modified_data.clone(),
            summary: bp.summary.clone(),
        }
    }
}

impl From<WireBreakpoint> for Breakpoint {
    fn from(w: WireBreakpoint) -> Self {
        Breakpoint {
            id: w.uuid,
            agent_name: w.agent,
            event_id: w.event_id,
            creation_time: unix_to_datetime(w.time),
            summary: w.summary,
            original_data: w.original_data,
            modified_data: w.modified_data,
        }
    }
}

impl From<WireEvent> for Event {
    fn from(w: WireEvent) -> Self {
        Event {
            id: w.uuid,
            kind: w.kind,
            creation_time: unix_to_datetime(w.time),
            data: w.data,
            breakpoints: w.breakpoints.into_iter().map(Breakpoint::from).collect(),
        }
    }
}

impl From<&Event> for WireEvent {
    fn from(e: &Event) -> Self {
        Self {
            uuid: e.id,
            kind: e.kind,
            time: e.creation_time.timestamp(),
            data: e.data.clone(),
            breakpoints: e.breakpoints.iter().map(WireBreakpoint::from).collect(),
        }
    }
}

impl From<WireChange> for Change {
    fn from(w: WireChange) -> Self {
        Change::new(w.path, w.change_type, w.diff, w.content, w.previous_content)
    }
}

impl From<&Change> for WireChange {
    fn from(c: &Change) -> Self {
        Self {
            path: c.path.clone(),
            change_type: c.change_type,
            diff: c.diff.clone(),
            content: c.content.clone(),
            previous_content: c.previous_content.clone(),
        }
    }
}

impl From<WireCommit> for Commit {
    fn from(w: WireCommit) -> Self {
        Commit {
            id: w.id,
            date: unix_to_datetime(w.date),
            title: w.title,
            changes: w.changes.into_iter().map(Change::from).collect(),
        }
    }
}

impl From<&Commit> for WireCommit {
    fn from(c: &Commit) -> Self {
        Self {
            id: c.id.clone(),
            date: c.date.timestamp(),
            title: c.title.clone(),
            changes: c.changes.iter().map(WireChange::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_event_envelope() {
        let text = serde_json::json!({
            "message": "event",
            "data": {
                "uuid": Uuid::new_v4(),
                "type": "PROGRAM_STARTED",
                "time": 1_700_000_000i64,
                "data": "demo-agent",
                "breakpoints": [],
            }
        })
        .to_string();
        let decoded = decode_agent_message(&text).unwrap();
        match decoded {
            AgentEnvelope::Event(e) => assert_eq!(e.kind, EventKind::ProgramStarted),
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn decodes_breakpoint_envelope_and_converts() {
        let event_id = Uuid::new_v4();
        let text = serde_json::json!({
            "message": "breakpoint",
            "data": {
                "uuid": Uuid::new_v4(),
                "agent": "demo-agent",
                "event_id": event_id,
                "time": 1_700_000_000i64,
                "original_data": "hi",
                "modified_data": null,
                "summary": null,
            }
        })
        .to_string();
        let decoded = decode_agent_message(&text).unwrap();
        let AgentEnvelope::Breakpoint(w) = decoded else {
            panic!("expected Breakpoint");
        };
        let bp: Breakpoint = w.into();
        assert_eq!(bp.event_id, event_id);
        assert_eq!(bp.original_data, Value::String("hi".into()));
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let text = r#"{"message":"bogus","data":{}}"#;
        assert!(matches!(
            decode_agent_message(text),
            Err(CoordinatorError::MalformedMessage(_))
        ));
    }

    #[test]
    fn missing_data_is_malformed() {
        let text = r#"{"message":"event"}"#;
        assert!(matches!(
            decode_agent_message(text),
            Err(CoordinatorError::MalformedMessage(_))
        ));
    }

    #[test]
    fn malformed_json_is_malformed() {
        let text = "not json";
        assert!(matches!(
            decode_agent_message(text),
            Err(CoordinatorError::MalformedMessage(_))
        ));
    }

    #[test]
    fn round_trips_breakpoint_release_encoding() {
        let bp = Breakpoint::new("demo-agent", Value::String("hi".into()), Uuid::new_v4());
        let encoded = encode_breakpoint_release(&bp);
        let decoded = decode_agent_message(&encoded).unwrap();
        let AgentEnvelope::Breakpoint(w) = decoded else {
            panic!("expected Breakpoint");
        };
        assert_eq!(w.uuid, bp.id);
        assert_eq!(w.original_data, bp.original_data);
    }

    #[test]
    fn decodes_commit_envelope() {
        let text = serde_json::json!({
            "message": "commit",
            "data": {
                "id": "deadbeef",
                "date": 1_700_000_000i64,
                "title": "initial commit",
                "changes": [{
                    "path": "a.rs",
                    "change_type": "new file",
                    "diff": "",
                    "content": "fn main(){}",
                    "previous_content": "",
                }]
            }
        })
        .to_string();
        let decoded = decode_agent_message(&text).unwrap();
        let AgentEnvelope::Commit(w) = decoded else {
            panic!("expected Commit");
        };
        let commit: Commit = w.into();
        assert_eq!(commit.id, "deadbeef");
        assert_eq!(commit.changes[0].change_type, ChangeKind::NewFile);
    }
}
