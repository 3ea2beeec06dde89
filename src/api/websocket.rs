//! WebSocket handler for real-time snapshot streaming

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{actors::messages::SnapshotEvent, api::state::ApiState};

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

fn encode(event: &SnapshotEvent) -> Option<String> {
    let json = serde_json::json!({
        "type": "snapshot",
        "host_name": event.host_name,
        "snapshot": event.snapshot,
    });

    serde_json::to_string(&json).ok()
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: ApiState) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut snapshot_rx = state.engine.subscribe();

    // Forward snapshots until the client goes away
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match snapshot_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagged, skipped {skipped} snapshots");
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!("snapshot channel closed");
                    break;
                }
            };

            let Some(text) = encode(&event) else {
                continue;
            };

            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Incoming messages are only watched for close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected");
}
