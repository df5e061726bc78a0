//! UI↔Core projection: `Message`/`Participant`/`ContentType`, the serialized
//! `Run` snapshot, and the inbound/outbound UI envelopes (§4.2, §4.6, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::breakpoint::Breakpoint;
use crate::domain::commit::Commit;
use crate::domain::event::{Event, EventKind};
use crate::domain::run::Run;
use crate::state::{AgentState, ExecutionState};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Participant {
    Llm,
    Tools,
    System,
    Core,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub uuid: Uuid,
    pub from: Participant,
    pub to: Participant,
    pub content: Value,
    pub content_type: ContentType,
    pub summary: Option<String>,
    pub sent_at: String,
}

fn content_type_of(bp: &Breakpoint) -> ContentType {
    if bp.is_structured() {
        ContentType::Json
    } else {
        ContentType::Text
    }
}

/// The "to" participant of a breakpoint's `Message`: `Llm`/`Tools` when it's
/// the *begin* breakpoint of an `llm_query`/`tool_invocation` event, else
/// `System` for program-boundary events, else `Core`.
fn to_participant(event: &Event, bp: &Breakpoint) -> Participant {
    if event.is_begin(bp) {
        match event.kind {
            EventKind::LlmQuery => return Participant::Llm,
            EventKind::ToolInvocation => return Participant::Tools,
            _ => {}
        }
    }
    match event.kind {
        EventKind::ProgramStarted | EventKind::ProgramFinished => Participant::System,
        _ => Participant::Core,
    }
}

/// The "from" participant: `Llm`/`Tools` when it's the *end* breakpoint of
/// those same event kinds, else `System` for program boundary events, else
/// `Core`.
fn from_participant(event: &Event, bp: &Breakpoint) -> Participant {
    if event.is_end(bp) {
        match event.kind {
            EventKind::LlmQuery => return Participant::Llm,
            EventKind::ToolInvocation => return Participant::Tools,
            _ => {}
        }
    }
    match event.kind {
        EventKind::ProgramStarted | EventKind::ProgramFinished => Participant::System,
        _ => Participant::Core,
    }
}

impl Message {
    pub fn from_breakpoint(event: &Event, bp: &Breakpoint) -> Self {
        Self {
            uuid: bp.id,
            from: from_participant(event, bp),
            to: to_participant(event, bp),
            content: bp.effective_data().clone(),
            content_type: content_type_of(bp),
            summary: bp.summary.clone(),
            sent_at: format_timestamp(bp.creation_time),
        }
    }

    /// A `debug_message` event (no breakpoints) becomes exactly one
    /// `Message` carrying its text.
    pub fn from_debug_event(event: &Event) -> Self {
        let text = event
            .data
            .clone()
            .unwrap_or(Value::String(String::new()));
        Self {
            uuid: event.id,
            from: Participant::Core,
            to: Participant::Core,
            content: text,
            content_type: ContentType::Text,
            summary: None,
            sent_at: format_timestamp(event.creation_time),
        }
    }

    /// Flattens every breakpoint of every event in `run` into a
    /// time-ordered list of `Message`; a breakpoint-less `debug_message`
    /// event contributes exactly one; any other breakpoint-less event
    /// contributes nothing.
    pub fn from_run(run: &Run) -> Vec<Message> {
        let mut messages: Vec<(DateTime<Utc>, Message)> = Vec::new();
        for event in run.events_in_order() {
            if event.breakpoints.is_empty() {
                if event.kind == EventKind::DebugMessage {
                    messages.push((event.creation_time, Message::from_debug_event(event)));
                }
                continue;
            }
            for bp in &event.breakpoints {
                messages.push((bp.creation_time, Message::from_breakpoint(event, bp)));
            }
        }
        messages.sort_by_key(|(t, _)| *t);
        messages.into_iter().map(|(_, m)| m).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedRun {
    pub uuid: Uuid,
    pub name: String,
    pub program_name: String,
    pub start_time: String,
    pub state: ExecutionState,
    pub agent_state: AgentState,
    pub commits: Vec<Commit>,
    pub messages: Vec<Message>,
    pub halted_at: Option<Uuid>,
}

/// Serializes a `Run` plus the coordinator-global state for the UI wire.
/// `state`/`agent_state`/`halted_at` are coordinator-global rather than
/// per-run, but are embedded here since the spec's `init_app_state` snapshot
/// shows them per serialized run; only the active run ever carries a
/// meaningfully "live" state — history runs are serialized with the state
/// the coordinator last reported (`Idle`/`AgentFinished`/no halt).
pub fn serialize_run(
    run: &Run,
    state: ExecutionState,
    agent_state: AgentState,
    halted_at: Option<Uuid>,
) -> SerializedRun {
    SerializedRun {
        uuid: run.id,
        name: run.name.clone(),
        program_name: run.program_name.clone(),
        start_time: format_timestamp(run.start_time),
        state,
        agent_state,
        commits: run.commits.clone(),
        messages: Message::from_run(run),
        halted_at,
    }
}

// ---------------------------------------------------------------------
// Outbound (Core -> UI) envelope
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct InitAppStateContent {
    pub runs: Vec<SerializedRun>,
    pub active_run: Option<Uuid>,
    pub halted_at: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessageContent {
    pub run_id: Uuid,
    pub message: Message,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRunContent {
    pub run: SerializedRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRunStateContent {
    pub run_id: Uuid,
    pub state: ExecutionState,
    pub agent_state: AgentState,
    pub halted_at: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCommitContent {
    pub run_id: Uuid,
    pub commit: Commit,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunExportContent {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorContent {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "content", rename_all = "snake_case")]
pub enum UiOutbound {
    InitAppState(InitAppStateContent),
    NewMessage(NewMessageContent),
    NewRun(NewRunContent),
    UpdateRunState(UpdateRunStateContent),
    NewCommit(NewCommitContent),
    RunExport(RunExportContent),
    Error(ErrorContent),
}

impl UiOutbound {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("UI outbound envelope serializes to JSON")
    }
}

// ---------------------------------------------------------------------
// Inbound (UI -> Core) envelope
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMsgContentPayload {
    pub message: Uuid,
    pub content: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameRunPayload {
    pub uuid: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunIdPayload {
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRunPayload {
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "content", rename_all = "snake_case")]
pub enum UiInbound {
    Step,
    Continue,
    Halt,
    UpdateMsgContent(UpdateMsgContentPayload),
    RenameRun(RenameRunPayload),
    DeleteRun(RunIdPayload),
    DownloadRunRequest(RunIdPayload),
    ImportRun(ImportRunPayload),
}

pub fn decode_ui_message(text: &str) -> Result<UiInbound, crate::error::CoordinatorError> {
    serde_json::from_str(text)
        .map_err(|e| crate::error::CoordinatorError::MalformedMessage(e.to_string()))
}
