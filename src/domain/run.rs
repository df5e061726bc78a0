//! One start-to-finish execution of an agent program.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::codec::{unix_to_datetime, WireCommit, WireEvent};

use super::commit::Commit;
use super::event::{Event, EventKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub name: String,
    pub program_name: String,
    pub start_time: DateTime<Utc>,
    pub events: HashMap<Uuid, Event>,
    pub commits: Vec<Commit>,
    pub server_version: String,
}

/// The plain-JSON wire shape written by [`Run::to_bytes`] and read by
/// [`Run::from_bytes`]. Events are serialized as a time-ordered array (the
/// map representation is an in-memory lookup convenience only), and built
/// on the same `WireEvent`/`WireCommit` shapes the agent envelope uses so
/// that timestamps land as unix-seconds numbers under `uuid`/`agent`/`time`
/// rather than the domain structs' ISO strings and field names (§4.1, §6).
#[derive(Debug, Serialize, Deserialize)]
struct RunBytes {
    uuid: Uuid,
    name: String,
    program_name: String,
    start_time: i64,
    events: Vec<WireEvent>,
    commits: Vec<WireCommit>,
    server_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RunDecodeError {
    #[error("invalid run blob: {0}")]
    Json(#[from] serde_json::Error),
}

impl Run {
    pub fn new(program_name: impl Into<String>, name: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            program_name: program_name.into(),
            start_time: Utc::now(),
            events: HashMap::new(),
            commits: Vec::new(),
            server_version: server_version.into(),
        }
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.insert(event.id, event);
    }

    /// Events in this run of the given kind, sorted ascending by `creation_time`.
    fn events_of_kind(&self, kind: EventKind) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.values().filter(|e| e.kind == kind).collect();
        events.sort_by_key(|e| e.creation_time);
        events
    }

    /// `llm_query` events strictly preceding `before` (or all, time-sorted, if
    /// `before` is absent). Used only by the summarizer to build context.
    pub fn previous_llm_queries(&self, before: Option<&Event>) -> Vec<&Event> {
        let queries = self.events_of_kind(EventKind::LlmQuery);
        match before {
            Some(b) => queries
                .into_iter()
                .filter(|e| e.creation_time < b.creation_time)
                .collect(),
            None => queries,
        }
    }

    /// All events in this run, sorted ascending by `creation_time`.
    pub fn events_in_order(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.values().collect();
        events.sort_by_key(|e| e.creation_time);
        events
    }

    /// Plain (uncompressed, non-base64) UTF-8 JSON. Both the `--runs`
    /// file-preload path and the UI export/import path use this; any
    /// base64(zlib(...)) wrapping is applied by the caller, not here.
    pub fn to_bytes(&self) -> Vec<u8> {
        let wire = RunBytes {
            uuid: self.id,
            name: self.name.clone(),
            program_name: self.program_name.clone(),
            start_time: self.start_time.timestamp(),
            events: self.events_in_order().into_iter().map(WireEvent::from).collect(),
            commits: self.commits.iter().map(WireCommit::from).collect(),
            server_version: self.server_version.clone(),
        };
        // Serializing a well-formed RunBytes to JSON cannot fail.
        serde_json::to_vec(&wire).expect("Run serializes to JSON")
    }

    /// Decodes plain JSON bytes and stamps a fresh id on the result,
    /// regardless of the id present in the blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RunDecodeError> {
        let wire: RunBytes = serde_json::from_slice(bytes)?;
        let events = wire
            .events
            .into_iter()
            .map(Event::from)
            .map(|e| (e.id, e))
            .collect::<HashMap<_, _>>();
        Ok(Self {
            id: Uuid::new_v4(),
            name: wire.name,
            program_name: wire.program_name,
            start_time: unix_to_datetime(wire.start_time),
            events,
            commits: wire.commits.into_iter().map(Commit::from).collect(),
            server_version: wire.server_version,
        })
    }

    /// Structural comparison ignoring `id` — used by import/export round-trip
    /// tests, since `from_bytes` always stamps a fresh id.
    #[cfg(test)]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        let mut self_events: Vec<&Event> = self.events_in_order();
        let mut other_events: Vec<&Event> = other.events_in_order();
        self_events.sort_by_key(|e| e.id);
        other_events.sort_by_key(|e| e.id);
        self.name == other.name
            && self.program_name == other.program_name
            && self.start_time.timestamp() == other.start_time.timestamp()
            && self.server_version == other.server_version
            && self.commits == other.commits
            && self_events.len() == other_events.len()
            && self_events
                .iter()
                .zip(other_events.iter())
                .all(|(a, b)| events_structurally_eq(a, b))
    }
}

#[cfg(test)]
fn events_structurally_eq(a: &Event, b: &Event) -> bool {
    a.id == b.id
        && a.kind == b.kind
        && a.creation_time.timestamp() == b.creation_time.timestamp()
        && a.data == b.data
        && a.breakpoints.len() == b.breakpoints.len()
        && a.breakpoints
            .iter()
            .zip(b.breakpoints.iter())
            .all(|(x, y)| {
                x.id == y.id
                    && x.agent_name == y.agent_name
                    && x.event_id == y.event_id
                    && x.original_data == y.original_data
                    && x.modified_data == y.modified_data
                    && x.summary == y.summary
            })
}

impl PartialEq for Run {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Run {}

/// Effective payload the summarizer or UI should treat as this run's most
/// recent query context (empty string if there is none).
pub fn effective_request_context(run: &Run, before: Option<&Event>) -> String {
    run.previous_llm_queries(before)
        .last()
        .and_then(|e| e.begin_breakpoint())
        .map(|bp| match bp.effective_data() {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}
