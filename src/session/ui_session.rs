//! The UI peer's WebSocket endpoint (§4.6). At most one UI connection is
//! accepted; a second is refused before the upgrade completes. Unlike the
//! agent side, a malformed or rejected UI command never closes the session
//! (§4.10).

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::ui_wire::decode_ui_message;

use super::SharedCoordinator;

#[derive(Clone)]
pub struct UiSessionState {
    pub coordinator: SharedCoordinator,
}

pub fn router(state: UiSessionState) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<UiSessionState>) -> Response {
    if state.coordinator.lock().await.ui_connected() {
        tracing::warn!("refusing second UI connection");
        return (StatusCode::CONFLICT, "a UI is already connected").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: UiSessionState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    {
        let mut c = state.coordinator.lock().await;
        if let Err(e) = c.register_ui(tx) {
            tracing::warn!(error = %e, "refusing second UI connection");
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
            Some(Ok(WsMessage::Text(text))) => match decode_ui_message(&text) {
                Ok(cmd) => state.coordinator.lock().await.handle_ui_command(cmd),
                Err(e) => state.coordinator.lock().await.report_malformed_ui_message(&e),
            },
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "UI transport error");
                break;
            }
        }
    }

    writer.abort();
    state.coordinator.lock().await.unregister_ui();
}
