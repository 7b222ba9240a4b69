//! services/api/src/web/ws_handler.rs
//!
//! Live view of the composer for a browser client. The server pushes a snapshot
//! on connect and after every state change (including timer-driven resets); the
//! client may push keystroke-level draft edits back.

use crate::web::{
    protocol::{ClientMessage, ComposerView, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    let (mut sender, mut receiver) = socket.split();
    let mut updates = app_state.composer.subscribe();

    let initial = {
        let snapshot = updates.borrow_and_update();
        ServerMessage::Snapshot(ComposerView::from(&*snapshot))
    };
    if send_message(&mut sender, &initial).await.is_err() {
        error!("Failed to send initial snapshot.");
        return;
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let message = {
                    let snapshot = updates.borrow_and_update();
                    ServerMessage::Snapshot(ComposerView::from(&*snapshot))
                };
                if send_message(&mut sender, &message).await.is_err() {
                    warn!("Failed to push snapshot. Client may have disconnected.");
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Err(message) = handle_text_message(text.as_str(), &app_state).await {
                        let _ = send_message(&mut sender, &ServerMessage::Error { message }).await;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            }
        }
    }

    info!("WebSocket connection closed.");
}

/// Applies one client edit. The resulting snapshot reaches every subscriber,
/// this one included, through the watch channel.
async fn handle_text_message(text: &str, app_state: &AppState) -> Result<(), String> {
    let message = serde_json::from_str::<ClientMessage>(text).map_err(|e| {
        warn!("Failed to deserialize client message: {}", e);
        format!("Unrecognised message: {}", e)
    })?;

    let composer = &app_state.composer;
    match message {
        ClientMessage::SetSubject { subject } => {
            composer.set_subject(subject).await;
        }
        ClientMessage::SetBody { body } => {
            composer.set_body(body).await;
        }
        ClientMessage::ClearDraft => {
            composer.clear_draft().await;
        }
    }
    Ok(())
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
