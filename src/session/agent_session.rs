//! The Agent peer's WebSocket endpoint (§4.5). At most one agent connection
//! is accepted; a second is refused before the upgrade completes.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::codec::{decode_agent_message, AgentEnvelope};
use crate::error::CoordinatorError;

use super::SharedCoordinator;

#[derive(Clone)]
pub struct AgentSessionState {
    pub coordinator: SharedCoordinator,
    pub logs_dir: Arc<PathBuf>,
}

pub fn router(state: AgentSessionState) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AgentSessionState>) -> Response {
    if state.coordinator.lock().await.agent_connected() {
        tracing::warn!("refusing second agent connection");
        return (StatusCode::CONFLICT, "an agent is already connected").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Decodes one inbound text frame and dispatches it to the coordinator.
/// Returns `Err` for a failure that should close the agent connection
/// (§4.10: `MalformedMessage`/`ProtocolViolation` close the offending peer).
async fn dispatch_inbound(coordinator: &SharedCoordinator, text: &str) -> Result<(), CoordinatorError> {
    let envelope = decode_agent_message(text)?;
    let mut c = coordinator.lock().await;
    match envelope {
        AgentEnvelope::Event(w) => c.handle_agent_event(w.into()),
        AgentEnvelope::Breakpoint(w) => c.handle_agent_breakpoint(w.into()).await,
        AgentEnvelope::Commit(w) => c.handle_agent_commit(w.into()),
    }
}

async fn handle_socket(socket: WebSocket, state: AgentSessionState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    {
        let mut c = state.coordinator.lock().await;
        if let Err(e) = c.register_agent(tx) {
            tracing::warn!(error = %e, "refusing second agent connection");
            drop(c);
            let _ = sink.send(WsMessage::Close(None)).await;
            return;
        }
    }

    let mut outbound = UnboundedReceiverStream::new(rx);
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.next().await {
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Err(e) = dispatch_inbound(&state.coordinator, &text).await {
                    tracing::warn!(error = %e, "closing agent connection");
                    break;
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "agent transport error");
                break;
            }
        }
    }

    writer.abort();
    let mut c = state.coordinator.lock().await;
    c.handle_agent_disconnect(&state.logs_dir);
}
