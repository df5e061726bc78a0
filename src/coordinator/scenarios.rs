//! End-to-end coordinator scenarios exercising the public handler surface
//! directly, with no sockets involved (§8 S1-S6).

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::Coordinator;
use crate::domain::event::{Event, EventKind};
use crate::state::{AgentState, ExecutionState};
use crate::summarizer::test_support::StubSummarizer;
use crate::ui_wire::{decode_ui_message, UiInbound};
use crate::version::Version;

fn server_version() -> Version {
    "v1.0.0-beta.pre-2".parse().unwrap()
}

fn new_coordinator(fail_summaries: bool) -> (Coordinator, mpsc::UnboundedReceiver<String>, mpsc::UnboundedReceiver<String>) {
    let summarizer = Arc::new(StubSummarizer::new(fail_summaries));
    let mut coordinator = Coordinator::new(server_version(), summarizer);
    let (agent_tx, agent_rx) = mpsc::unbounded_channel();
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    coordinator.register_agent(agent_tx).unwrap();
    coordinator.register_ui(ui_tx).unwrap();
    (coordinator, agent_rx, ui_rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

fn program_started(program: &str) -> Event {
    let mut e = Event::new(EventKind::ProgramStarted);
    e.data = Some(Value::String(program.into()));
    e
}

fn llm_query_event() -> Event {
    Event::new(EventKind::LlmQuery)
}

/// S1: Step through one LLM query — begin breakpoint halts, UI `step`
/// releases it with staged `modified_data`, end breakpoint halts again.
#[tokio::test]
async fn s1_step_through_one_llm_query() {
    let (mut c, mut agent_rx, mut ui_rx) = new_coordinator(false);

    c.handle_agent_event(program_started("demo-agent")).unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Step);
    drain(&mut ui_rx);

    let event = llm_query_event();
    let event_id = event.id;
    c.handle_agent_event(event).unwrap();

    let begin = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("request payload"), event_id);
    let begin_id = begin.id;
    c.handle_agent_breakpoint(begin).await.unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Halted);
    assert_eq!(c.pending_breakpoint().unwrap().id, begin_id);
    assert!(agent_rx.try_recv().is_err(), "agent must not be released yet");

    let update = decode_ui_message(
        &json!({"event": "update_msg_content", "content": {"message": begin_id, "content": "hello"}}).to_string(),
    )
    .unwrap();
    c.handle_ui_command(update);
    assert!(matches!(c.pending_breakpoint().unwrap().modified_data, Some(Value::String(ref s)) if s == "hello"));

    c.handle_ui_command(UiInbound::Step);
    assert_eq!(c.execution_state(), ExecutionState::Step);
    assert!(c.pending_breakpoint().is_none());
    let released = agent_rx.try_recv().unwrap();
    assert!(released.contains("hello"));

    let run = c.registry().active().unwrap();
    let stored = run.events[&event_id]
        .breakpoints
        .iter()
        .find(|b| b.id == begin_id)
        .unwrap();
    assert_eq!(stored.modified_data, Some(Value::String("hello".into())));

    let end = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("response payload"), event_id);
    c.handle_agent_breakpoint(end).await.unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Halted);
    assert_eq!(c.agent_state(), AgentState::Halted);
}

/// S2: Continue mode releases every breakpoint immediately without halting.
#[tokio::test]
async fn s2_continue_mode_skips_halts() {
    let (mut c, mut agent_rx, _ui_rx) = new_coordinator(false);
    c.handle_agent_event(program_started("demo-agent")).unwrap();
    c.handle_ui_command(UiInbound::Continue);
    assert_eq!(c.execution_state(), ExecutionState::Continue);

    let event = llm_query_event();
    c.handle_agent_event(event.clone()).unwrap();
    let begin = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("req"), event.id);
    c.handle_agent_breakpoint(begin).await.unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Continue);
    assert!(c.pending_breakpoint().is_none());
    assert!(agent_rx.try_recv().is_ok(), "continue must release immediately");

    let end = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("resp"), event.id);
    c.handle_agent_breakpoint(end).await.unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Continue);
    assert!(agent_rx.try_recv().is_ok());
}

/// S3: A UI `halt` while in Continue mode takes effect at the next
/// breakpoint, which then halts as Step mode would.
#[tokio::test]
async fn s3_halt_during_continue() {
    let (mut c, mut agent_rx, _ui_rx) = new_coordinator(false);
    c.handle_agent_event(program_started("demo-agent")).unwrap();
    c.handle_ui_command(UiInbound::Continue);

    c.handle_ui_command(UiInbound::Halt);
    assert_eq!(c.execution_state(), ExecutionState::Step);
    assert_eq!(c.agent_state(), AgentState::Halting);

    c.handle_ui_command(UiInbound::Halt);
    assert_eq!(c.execution_state(), ExecutionState::Step, "double halt is idempotent");

    let event = llm_query_event();
    c.handle_agent_event(event.clone()).unwrap();
    let begin = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("req"), event.id);
    c.handle_agent_breakpoint(begin).await.unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Halted);
    assert!(agent_rx.try_recv().is_err());
}

/// S4: Agent disconnect mid-event finalizes the active run with a synthetic
/// `program_finished` breakpoint and retires it to history.
#[tokio::test]
async fn s4_agent_disconnect_mid_event() {
    let (mut c, _agent_rx, mut ui_rx) = new_coordinator(false);
    c.handle_agent_event(program_started("demo-agent")).unwrap();
    let event = llm_query_event();
    let event_id = event.id;
    c.handle_agent_event(event).unwrap();
    let begin = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("req"), event_id);
    c.handle_agent_breakpoint(begin).await.unwrap();
    assert_eq!(c.execution_state(), ExecutionState::Halted);
    drain(&mut ui_rx);

    let logs_dir = tempfile::tempdir().unwrap();
    c.handle_agent_disconnect(logs_dir.path());

    assert_eq!(c.execution_state(), ExecutionState::Idle);
    assert_eq!(c.agent_state(), AgentState::AgentFinished);
    assert!(c.pending_breakpoint().is_none());
    assert!(c.registry().active().is_none());
    assert_eq!(c.registry().history().len(), 1);
    assert!(std::fs::read_dir(logs_dir.path()).unwrap().count() >= 1);

    let events = drain(&mut ui_rx);
    assert!(events.iter().any(|e| e["event"] == "new_message"));
    assert!(events.iter().any(|e| e["event"] == "update_run_state"));
}

/// S5: Export a finished run, import it back, and verify it round-trips
/// structurally under a fresh id into history.
#[tokio::test]
async fn s5_import_export_round_trip() {
    let (mut c, _agent_rx, mut ui_rx) = new_coordinator(false);
    c.handle_agent_event(program_started("demo-agent")).unwrap();
    let event = llm_query_event();
    let event_id = event.id;
    c.handle_agent_event(event).unwrap();
    let begin = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("req"), event_id);
    c.handle_agent_breakpoint(begin).await.unwrap();
    c.handle_ui_command(UiInbound::Step);
    let end = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("resp"), event_id);
    c.handle_agent_breakpoint(end).await.unwrap();

    let logs_dir = tempfile::tempdir().unwrap();
    c.handle_agent_disconnect(logs_dir.path());
    let run_id = c.registry().history()[0].id;
    drain(&mut ui_rx);

    c.handle_ui_command(UiInbound::DownloadRunRequest(crate::ui_wire::RunIdPayload { uuid: run_id }));
    let exported = drain(&mut ui_rx);
    let export = exported.iter().find(|e| e["event"] == "run_export").unwrap();
    let data = export["content"]["data"].as_str().unwrap().to_string();

    let history_before = c.registry().history().len();
    c.handle_ui_command(UiInbound::ImportRun(crate::ui_wire::ImportRunPayload { data }));
    assert_eq!(c.registry().history().len(), history_before + 1);
    let imported = c.registry().history().last().unwrap();
    assert_ne!(imported.id, run_id);
    assert!(imported.structurally_eq(c.registry().lookup_id(run_id).unwrap()));
}

/// S6: A run whose `server_version` is an incompatible alpha build is
/// rejected by the version gate rather than imported.
#[tokio::test]
async fn s6_version_gate_rejects_alpha_into_beta() {
    let (mut c, _agent_rx, mut ui_rx) = new_coordinator(false);
    let run = crate::domain::run::Run::new("demo-agent", "Run #1 of demo-agent", "v1.0.0-alpha.pre-3");
    let bytes = run.to_bytes();
    let compressed = {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&bytes).unwrap();
        enc.finish().unwrap()
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let data = STANDARD.encode(compressed);

    let history_before = c.registry().history().len();
    c.handle_ui_command(UiInbound::ImportRun(crate::ui_wire::ImportRunPayload { data }));
    assert_eq!(c.registry().history().len(), history_before);

    let events = drain(&mut ui_rx);
    assert!(events.iter().any(|e| e["event"] == "error"));
}

#[tokio::test]
async fn duplicate_agent_connection_is_refused() {
    let (mut c, _agent_rx, _ui_rx) = new_coordinator(false);
    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(c.register_agent(tx).is_err());
}

#[tokio::test]
async fn unknown_breakpoint_summary_is_filled_by_summarizer() {
    let (mut c, _agent_rx, _ui_rx) = new_coordinator(false);
    c.handle_agent_event(program_started("demo-agent")).unwrap();
    let event = llm_query_event();
    let event_id = event.id;
    c.handle_agent_event(event).unwrap();
    let bp = crate::domain::breakpoint::Breakpoint::new("demo-agent", json!("req"), event_id);
    c.handle_agent_breakpoint(bp).await.unwrap();
    let stored = &c.registry().active().unwrap().events[&event_id].breakpoints[0];
    assert_eq!(stored.summary.as_deref(), Some("summary:summarize_query_request"));
}
