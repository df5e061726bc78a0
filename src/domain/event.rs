//! A semantic step in agent execution, bracketed by zero, one, or two breakpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::breakpoint::Breakpoint;

/// The kind of step an `Event` represents. Wire representation is the
/// SCREAMING_SNAKE_CASE form used by the agent-facing envelope (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "PROGRAM_STARTED")]
    ProgramStarted,
    #[serde(rename = "PROGRAM_FINISHED")]
    ProgramFinished,
    #[serde(rename = "LLM_QUERY")]
    LlmQuery,
    #[serde(rename = "TOOL_INVOCATION")]
    ToolInvocation,
    #[serde(rename = "DEBUG_MESSAGE")]
    DebugMessage,
}

impl EventKind {
    /// How many breakpoints this event kind carries once fully observed.
    pub fn expected_breakpoints(self) -> usize {
        match self {
            EventKind::ProgramStarted => 1,
            EventKind::ProgramFinished => 1,
            EventKind::LlmQuery => 2,
            EventKind::ToolInvocation => 2,
            EventKind::DebugMessage => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub creation_time: DateTime<Utc>,
    pub data: Option<Value>,
    pub breakpoints: Vec<Breakpoint>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            creation_time: Utc::now(),
            data: None,
            breakpoints: Vec::new(),
        }
    }

    pub fn has_begin_breakpoint(&self) -> bool {
        !self.breakpoints.is_empty()
    }

    pub fn has_end_breakpoint(&self) -> bool {
        self.breakpoints.len() >= 2
    }

    pub fn begin_breakpoint(&self) -> Option<&Breakpoint> {
        self.breakpoints.first()
    }

    pub fn end_breakpoint(&self) -> Option<&Breakpoint> {
        if self.has_end_breakpoint() {
            self.breakpoints.last()
        } else {
            None
        }
    }

    /// True if `bp` is this event's begin breakpoint, by id.
    pub fn is_begin(&self, bp: &Breakpoint) -> bool {
        self.begin_breakpoint().is_some_and(|b| b.id == bp.id)
    }

    /// True if `bp` is this event's end breakpoint, by id.
    pub fn is_end(&self, bp: &Breakpoint) -> bool {
        self.end_breakpoint().is_some_and(|b| b.id == bp.id)
    }
}
