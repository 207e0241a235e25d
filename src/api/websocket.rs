//! WebSocket handler for the table audio channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::session::{Outbound, ServerMessage, Session};
use crate::Error;

/// Outbound queue depth per connection
const OUTBOUND_CAPACITY: usize = 64;

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/audio", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = uuid::Uuid::new_v4().to_string();

    let connected = ServerMessage::Connected {
        session_id: session_id.clone(),
    };
    if let Ok(msg) = serde_json::to_string(&connected) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    tracing::info!(session_id = %session_id, "audio session connected");

    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);

    // Forward session output to the socket in the order it was produced
    let mut send_task = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let msg = match item {
                Outbound::Message(message) => match serde_json::to_string(&message) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize outbound message");
                        continue;
                    }
                },
                Outbound::Audio(bytes) => Message::Binary(bytes.into()),
            };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(
        session_id.clone(),
        state.services.clone(),
        state.session_config.clone(),
        tx.clone(),
    );

    // Inbound frames are handled one at a time; a turn holds the loop
    let recv_session_id = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let result = match msg {
                Message::Binary(bytes) => session.handle_audio(&bytes).await,
                Message::Text(text) => session.handle_text(text.as_str()).await,
                Message::Ping(data) => {
                    tracing::trace!(len = data.len(), "received ping");
                    Ok(())
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %recv_session_id, "audio session closed by client");
                    break;
                }
                Message::Pong(_) => Ok(()),
            };

            match result {
                Ok(()) => {}
                Err(Error::ChannelClosed) => break,
                Err(Error::Config(message)) => {
                    let _ = tx.send(ServerMessage::error("invalid_message", message).into()).await;
                }
                Err(e) => {
                    tracing::error!(session_id = %recv_session_id, error = %e, "session error");
                    let _ = tx
                        .send(ServerMessage::error("internal_error", e.to_string()).into())
                        .await;
                }
            }
        }
        session.state().completed().len()
    });

    let completed = tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            None
        }
        result = &mut recv_task => {
            send_task.abort();
            result.ok()
        }
    };

    tracing::info!(
        session_id = %session_id,
        orders = completed.unwrap_or_default(),
        "audio session ended"
    );
}
