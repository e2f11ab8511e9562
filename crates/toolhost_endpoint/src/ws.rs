use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use toolhost_protocol::{ClientRequest, ClientResponse, ProtocolError};

use crate::dispatch::dispatch;
use crate::state::EndpointState;

pub async fn client_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<EndpointState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

async fn handle_client(socket: WebSocket, state: Arc<EndpointState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = Uuid::new_v4();
    state.clients.write().await.insert(connection_id, tx.clone());

    let welcome = {
        let synth = state.synthesiser.lock().await;
        ClientResponse::welcome(synth.namespace_summaries())
    };
    if let Ok(text) = serde_json::to_string(&welcome) {
        let _ = tx.send(Message::Text(text));
    }

    let forward_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match decode_request(&text) {
                    Ok(request) => dispatch(&state, request).await,
                    Err(invalid) => invalid,
                };
                if let Ok(text) = serde_json::to_string(&reply) {
                    if tx.send(Message::Text(text)).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
    state.clients.write().await.remove(&connection_id);
}

/// Parses one inbound text frame. A frame that is valid JSON but matches
/// neither request shape still gets its `id` echoed on the error reply,
/// so the sender can correlate the rejection.
fn decode_request(text: &str) -> Result<ClientRequest, ClientResponse> {
    serde_json::from_str::<ClientRequest>(text).map_err(|_| {
        let id = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|frame| frame.get("id").and_then(|id| id.as_str().map(str::to_string)));
        ClientResponse::error(id, ProtocolError::InvalidFrame.to_string())
    })
}
