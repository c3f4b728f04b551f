// WebSocket endpoint for downstream price-stream clients
use crate::registry::ClientConnection;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tickrelay_common::{ClientCommand, ClientEnvelope, ClientId, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Write half of a downstream socket, shared with the fan-out path.
struct WsClientConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl ClientConnection for WsClientConnection {
    async fn send_json(&self, envelope: &ClientEnvelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let connection = Arc::new(WsClientConnection {
        sink: Mutex::new(sender),
    });
    let id = state.registry.add(connection).await;

    // Greet the client with its id before accepting commands.
    if state
        .registry
        .send_to(id, &ClientEnvelope::connected(id))
        .await
        .is_err()
    {
        state.router.unsubscribe_all(id).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = process_client_text(&state, id, &text).await;
                if state.registry.send_to(id, &reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Client {} sent close", id);
                break;
            }
            // Binary, ping and pong frames carry nothing we route.
            Ok(_) => {}
            Err(e) => {
                debug!("Client {} socket error: {}", id, e);
                break;
            }
        }
    }

    // Release routed symbols first, then drop the connection itself.
    state.router.unsubscribe_all(id).await;
    state.registry.remove(id).await;
    info!("WebSocket client session ended: {}", id);
}

/// Runs one inbound text frame and produces the reply envelope. Protocol
/// errors answer with an error envelope; they never close the connection
/// and never touch routing state.
pub(crate) async fn process_client_text(
    state: &AppState,
    id: ClientId,
    text: &str,
) -> ClientEnvelope {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            debug!("Client {} sent malformed JSON: {}", id, e);
            return ClientEnvelope::error(format!("Invalid message: {}", e));
        }
    };
    match command.action.as_str() {
        "subscribe" => {
            state.router.subscribe(id, &command.symbols).await;
            ClientEnvelope::subscribed(command.symbols)
        }
        "unsubscribe" => {
            state.router.unsubscribe(id, &command.symbols).await;
            ClientEnvelope::unsubscribed(command.symbols)
        }
        other => {
            debug!("Client {} sent unknown action: {}", id, other);
            ClientEnvelope::error(format!("Unknown action: {}", other))
        }
    }
}
