//! The supervising entity: execution-state, the pending-breakpoint
//! rendezvous, and the run registry, exposed through typed command handlers
//! that both sessions funnel their effects through (§2, §4.7).

#[cfg(test)]
mod scenarios;

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::write::ZlibEncoder;
use flate2::{read::ZlibDecoder, Compression};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::codec::encode_breakpoint_release;
use crate::domain::breakpoint::Breakpoint;
use crate::domain::commit::Commit;
use crate::domain::event::{Event, EventKind};
use crate::domain::run::Run;
use crate::error::CoordinatorError;
use crate::log_writer;
use crate::registry::RunRegistry;
use crate::state::{AgentState, ExecutionState};
use crate::summarizer::{summarize_breakpoint, Summarizer};
use crate::ui_wire::{
    serialize_run, ErrorContent, InitAppStateContent, Message, NewCommitContent,
    NewMessageContent, NewRunContent, RunExportContent, UiInbound, UiOutbound,
    UpdateRunStateContent,
};
use crate::version::{compatible_str, Version};

pub struct Coordinator {
    execution_state: ExecutionState,
    agent_state: AgentState,
    pending_breakpoint: Option<Breakpoint>,
    registry: RunRegistry,
    summarizer: Arc<dyn Summarizer>,
    server_version: Version,
    agent_tx: Option<mpsc::UnboundedSender<String>>,
    ui_tx: Option<mpsc::UnboundedSender<String>>,
}

fn agent_state_after_release(kind: EventKind, is_begin: bool) -> AgentState {
    if !is_begin {
        return AgentState::AgentRunning;
    }
    match kind {
        EventKind::LlmQuery => AgentState::LlmThinking,
        EventKind::ToolInvocation => AgentState::ToolExecuting,
        _ => AgentState::AgentRunning,
    }
}

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}

fn zlib_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

impl Coordinator {
    pub fn new(server_version: Version, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            execution_state: ExecutionState::Idle,
            agent_state: AgentState::AgentFinished,
            pending_breakpoint: None,
            registry: RunRegistry::new(),
            summarizer,
            server_version,
            agent_tx: None,
            ui_tx: None,
        }
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.execution_state
    }

    pub fn agent_state(&self) -> AgentState {
        self.agent_state
    }

    pub fn pending_breakpoint(&self) -> Option<&Breakpoint> {
        self.pending_breakpoint.as_ref()
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn agent_connected(&self) -> bool {
        self.agent_tx.is_some()
    }

    pub fn ui_connected(&self) -> bool {
        self.ui_tx.is_some()
    }

    /// Reports a UI-facing decode failure (§4.10: `MalformedMessage (UI)` is
    /// logged and surfaced as an `error` envelope, but never closes the
    /// session).
    pub fn report_malformed_ui_message(&self, err: &CoordinatorError) {
        tracing::warn!(error = %err, "malformed UI message");
        self.send_ui(UiOutbound::Error(ErrorContent {
            message: err.ui_message(),
        }));
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    pub fn register_agent(
        &mut self,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<(), CoordinatorError> {
        if self.agent_tx.is_some() {
            return Err(CoordinatorError::ConcurrencyConflict { peer: "agent" });
        }
        self.agent_tx = Some(tx);
        Ok(())
    }

    pub fn register_ui(&mut self, tx: mpsc::UnboundedSender<String>) -> Result<(), CoordinatorError> {
        if self.ui_tx.is_some() {
            return Err(CoordinatorError::ConcurrencyConflict { peer: "UI" });
        }
        self.ui_tx = Some(tx);
        let snapshot = self.snapshot();
        self.send_ui(UiOutbound::InitAppState(snapshot));
        Ok(())
    }

    pub fn unregister_ui(&mut self) {
        self.ui_tx = None;
    }

    fn snapshot(&self) -> InitAppStateContent {
        let halted_at = self.pending_breakpoint.as_ref().map(|b| b.id);
        let active_id = self.registry.active().map(|r| r.id);
        let runs = self
            .registry
            .all_runs()
            .into_iter()
            .map(|r| {
                if Some(r.id) == active_id {
                    serialize_run(r, self.execution_state, self.agent_state, halted_at)
                } else {
                    serialize_run(r, ExecutionState::Idle, AgentState::AgentFinished, None)
                }
            })
            .collect();
        InitAppStateContent {
            runs,
            active_run: active_id,
            halted_at,
        }
    }

    fn send_agent_release(&self, bp: &Breakpoint) {
        if let Some(tx) = &self.agent_tx {
            let _ = tx.send(encode_breakpoint_release(bp));
        }
    }

    fn send_ui(&self, msg: UiOutbound) {
        if let Some(tx) = &self.ui_tx {
            let _ = tx.send(msg.encode());
        }
    }

    fn broadcast_update_run_state(&self, run_id: Uuid) {
        self.send_ui(UiOutbound::UpdateRunState(UpdateRunStateContent {
            run_id,
            state: self.execution_state,
            agent_state: self.agent_state,
            halted_at: self.pending_breakpoint.as_ref().map(|b| b.id),
        }));
    }

    // -----------------------------------------------------------------
    // Agent-originated messages (§4.5)
    // -----------------------------------------------------------------

    pub fn handle_agent_event(&mut self, event: Event) -> Result<(), CoordinatorError> {
        if event.kind == EventKind::ProgramStarted {
            if self.registry.active().is_some() {
                return Err(CoordinatorError::ProtocolViolation(
                    "program_started received while a run is already active".into(),
                ));
            }
            let program_name = match &event.data {
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            };
            let name = self.registry.next_run_name(&program_name);
            let run = Run::new(program_name, name, self.server_version.to_string());
            self.registry.set_active(run);
            self.execution_state = ExecutionState::Step;
            self.agent_state = AgentState::AgentRunning;
        } else if self.registry.active().is_none() {
            return Err(CoordinatorError::ProtocolViolation(
                "event received with no active run".into(),
            ));
        }

        let is_debug = event.kind == EventKind::DebugMessage;
        let is_program_started = event.kind == EventKind::ProgramStarted;
        let event_clone = event.clone();
        let run = self
            .registry
            .active_mut()
            .expect("active run just ensured above");
        run.add_event(event);
        let run_id = run.id;

        if is_program_started {
            let serialized = serialize_run(
                self.registry.active().expect("just set"),
                self.execution_state,
                self.agent_state,
                None,
            );
            self.send_ui(UiOutbound::NewRun(NewRunContent { run: serialized }));
            self.broadcast_update_run_state(run_id);
        } else if is_debug && self.ui_tx.is_some() {
            self.send_ui(UiOutbound::NewMessage(NewMessageContent {
                run_id,
                message: Message::from_debug_event(&event_clone),
            }));
        }
        Ok(())
    }

    pub async fn handle_agent_breakpoint(&mut self, mut bp: Breakpoint) -> Result<(), CoordinatorError> {
        {
            let Some(active) = self.registry.active() else {
                return Err(CoordinatorError::ProtocolViolation(
                    "breakpoint received with no active run".into(),
                ));
            };
            if !active.events.contains_key(&bp.event_id) {
                return Err(CoordinatorError::ProtocolViolation(
                    "breakpoint's event_id is not part of the active run".into(),
                ));
            }
        }
        let run_id = self.registry.active().expect("checked above").id;

        if bp.summary.as_deref().map_or(true, str::is_empty) {
            if let Some(run) = self.registry.active().cloned() {
                if let Some(summary) = summarize_breakpoint(self.summarizer.as_ref(), &run, &bp).await {
                    bp.summary = Some(summary);
                }
            }
        }

        if !matches!(self.execution_state, ExecutionState::Step | ExecutionState::Continue) {
            return Err(CoordinatorError::ProtocolViolation(
                "breakpoint received while no breakpoint should be outstanding".into(),
            ));
        }

        let run = self.registry.active_mut().expect("active run checked above");
        let event = run
            .events
            .get_mut(&bp.event_id)
            .expect("event_id checked above");
        let is_begin_bp = event.breakpoints.is_empty();
        let event_kind = event.kind;
        event.breakpoints.push(bp.clone());
        let message = Message::from_breakpoint(event, &bp);

        match self.execution_state {
            ExecutionState::Step => {
                self.execution_state = ExecutionState::Halted;
                self.agent_state = AgentState::Halted;
                self.pending_breakpoint = Some(bp);
            }
            ExecutionState::Continue => {
                self.agent_state = agent_state_after_release(event_kind, is_begin_bp);
                self.send_agent_release(&bp);
            }
            ExecutionState::Idle | ExecutionState::Halted => {
                unreachable!("validated above")
            }
        }

        self.send_ui(UiOutbound::NewMessage(NewMessageContent { run_id, message }));
        self.broadcast_update_run_state(run_id);
        Ok(())
    }

    pub fn handle_agent_commit(&mut self, commit: Commit) -> Result<(), CoordinatorError> {
        let run = self.registry.active_mut().ok_or_else(|| {
            CoordinatorError::ProtocolViolation("commit received with no active run".into())
        })?;
        run.commits.push(commit.clone());
        let run_id = run.id;
        self.send_ui(UiOutbound::NewCommit(NewCommitContent { run_id, commit }));
        Ok(())
    }

    /// §4.7(c): finalize the active run, if any, with a synthetic
    /// `program_finished` event, write its log, and move it to history.
    pub fn handle_agent_disconnect(&mut self, logs_dir: &Path) {
        self.agent_tx = None;

        let Some(run_id) = self.registry.active().map(|r| r.id) else {
            self.execution_state = ExecutionState::Idle;
            self.agent_state = AgentState::AgentFinished;
            return;
        };

        let mut finished = Event::new(EventKind::ProgramFinished);
        let mut bp = Breakpoint::new("", Value::Null, finished.id);
        bp.summary = Some("Agent execution finished.".to_string());
        finished.breakpoints.push(bp.clone());
        let message = Message::from_breakpoint(&finished, &bp);

        let run = self.registry.active_mut().expect("checked above");
        run.add_event(finished);

        if let Some(retired) = self.registry.retire_active() {
            if let Err(e) = log_writer::write_run_log(&retired, logs_dir) {
                tracing::warn!(error = %e, "failed to write run log");
            }
        }

        self.pending_breakpoint = None;
        self.execution_state = ExecutionState::Idle;
        self.agent_state = AgentState::AgentFinished;

        self.send_ui(UiOutbound::NewMessage(NewMessageContent { run_id, message }));
        self.broadcast_update_run_state(run_id);
    }

    // -----------------------------------------------------------------
    // UI-originated commands (§4.6)
    // -----------------------------------------------------------------

    pub fn handle_ui_command(&mut self, cmd: UiInbound) {
        if let Err(e) = self.dispatch_ui_command(cmd) {
            tracing::warn!(error = %e, "UI command rejected");
            self.send_ui(UiOutbound::Error(ErrorContent {
                message: e.ui_message(),
            }));
        }
    }

    fn dispatch_ui_command(&mut self, cmd: UiInbound) -> Result<(), CoordinatorError> {
        match cmd {
            UiInbound::Step => self.cmd_step(),
            UiInbound::Continue => self.cmd_continue(),
            UiInbound::Halt => self.cmd_halt(),
            UiInbound::UpdateMsgContent(p) => self.cmd_update_msg_content(p.message, p.content),
            UiInbound::RenameRun(p) => self.registry.rename(p.uuid, p.name),
            UiInbound::DeleteRun(p) => self.registry.delete(p.uuid),
            UiInbound::DownloadRunRequest(p) => self.cmd_download_run(p.uuid),
            UiInbound::ImportRun(p) => self.cmd_import_run(p.data),
        }
    }

    /// §4.7(d). A `data` of `None` preserves any `modified_data` already
    /// staged via `update_msg_content`, rather than clobbering it.
    fn release_pending_breakpoint(&mut self, data: Option<Value>) -> Result<Uuid, CoordinatorError> {
        let Some(mut bp) = self.pending_breakpoint.take() else {
            return Err(CoordinatorError::ProtocolViolation(
                "release requested with no pending breakpoint".into(),
            ));
        };
        if let Some(data) = data {
            bp.modified_data = Some(data);
        }

        let run = self
            .registry
            .active_mut()
            .expect("pending breakpoint implies an active run");
        let run_id = run.id;
        let event = run
            .events
            .get_mut(&bp.event_id)
            .expect("breakpoint's event exists in the active run");
        let is_begin_bp = event.is_begin(&bp);
        let event_kind = event.kind;
        if let Some(stored) = event.breakpoints.iter_mut().find(|b| b.id == bp.id) {
            *stored = bp.clone();
        }

        self.agent_state = agent_state_after_release(event_kind, is_begin_bp);
        self.send_agent_release(&bp);
        Ok(run_id)
    }

    fn cmd_step(&mut self) -> Result<(), CoordinatorError> {
        match self.execution_state {
            ExecutionState::Halted => {
                let run_id = self.release_pending_breakpoint(None)?;
                self.execution_state = ExecutionState::Step;
                self.broadcast_update_run_state(run_id);
                Ok(())
            }
            ExecutionState::Continue => {
                self.execution_state = ExecutionState::Step;
                let run_id = self
                    .registry
                    .active()
                    .ok_or_else(|| {
                        CoordinatorError::ProtocolViolation("step received with no active run".into())
                    })?
                    .id;
                self.broadcast_update_run_state(run_id);
                Ok(())
            }
            ExecutionState::Idle | ExecutionState::Step => Err(CoordinatorError::ProtocolViolation(
                "step received while execution_state is neither Halted nor Continue".into(),
            )),
        }
    }

    fn cmd_continue(&mut self) -> Result<(), CoordinatorError> {
        let Some(run_id) = self.registry.active().map(|r| r.id) else {
            return Err(CoordinatorError::ProtocolViolation(
                "continue received with no active run".into(),
            ));
        };
        match self.execution_state {
            ExecutionState::Halted => {
                self.release_pending_breakpoint(None)?;
            }
            ExecutionState::Step | ExecutionState::Continue => {}
            ExecutionState::Idle => unreachable!("active run implies execution_state != Idle"),
        }
        self.execution_state = ExecutionState::Continue;
        self.broadcast_update_run_state(run_id);
        Ok(())
    }

    fn cmd_halt(&mut self) -> Result<(), CoordinatorError> {
        if self.execution_state != ExecutionState::Continue {
            return Err(CoordinatorError::ProtocolViolation(
                "halt received while execution_state is not Continue".into(),
            ));
        }
        self.execution_state = ExecutionState::Step;
        self.agent_state = if self.pending_breakpoint.is_some() {
            AgentState::Halted
        } else {
            AgentState::Halting
        };
        let run_id = self
            .registry
            .active()
            .expect("Continue implies an active run")
            .id;
        self.broadcast_update_run_state(run_id);
        Ok(())
    }

    fn cmd_update_msg_content(&mut self, message: Uuid, content: Value) -> Result<(), CoordinatorError> {
        match &mut self.pending_breakpoint {
            Some(bp) if bp.id == message => {
                bp.modified_data = Some(content);
                Ok(())
            }
            _ => Err(CoordinatorError::NotFound(message)),
        }
    }

    fn cmd_download_run(&mut self, id: Uuid) -> Result<(), CoordinatorError> {
        let run = self
            .registry
            .lookup_id(id)
            .ok_or(CoordinatorError::NotFound(id))?;
        let name = run.name.clone();
        let compressed = zlib_compress(&run.to_bytes());
        let data = STANDARD.encode(compressed);
        self.send_ui(UiOutbound::RunExport(RunExportContent { name, data }));
        Ok(())
    }

    fn cmd_import_run(&mut self, data: String) -> Result<(), CoordinatorError> {
        let compressed = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| CoordinatorError::MalformedMessage(e.to_string()))?;
        let bytes = zlib_decompress(&compressed)
            .map_err(|e| CoordinatorError::MalformedMessage(e.to_string()))?;
        let run = Run::from_bytes(&bytes)
            .map_err(|e| CoordinatorError::MalformedMessage(e.to_string()))?;
        self.insert_compatible_run(run)
    }

    /// Shared by `import_run` and `--runs` file preload (§6 CLI surface): a
    /// run whose `server_version` fails the gate is rejected rather than
    /// inserted.
    fn insert_compatible_run(&mut self, run: Run) -> Result<(), CoordinatorError> {
        if !compatible_str(&self.server_version, &run.server_version) {
            return Err(CoordinatorError::IncompatibleVersion);
        }
        let serialized = serialize_run(&run, ExecutionState::Idle, AgentState::AgentFinished, None);
        self.registry.insert_imported(run);
        self.send_ui(UiOutbound::NewRun(NewRunContent { run: serialized }));
        Ok(())
    }

    /// `--runs` file preload (§6 CLI surface): reads plain JSON bytes (no
    /// base64/zlib framing). A file that fails to parse, doesn't exist, or
    /// fails the version gate is skipped with a warning, not an abort.
    pub fn preload_run_file(&mut self, path: &Path) {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable run file");
                return;
            }
        };
        let run = match Run::from_bytes(&bytes) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unparseable run file");
                return;
            }
        };
        if let Err(e) = self.insert_compatible_run(run) {
            tracing::warn!(path = %path.display(), error = %e, "skipping incompatible run file");
        }
    }
}
