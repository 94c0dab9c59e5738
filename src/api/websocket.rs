//! WebSocket stream of check events

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

use crate::{actors::CheckEvent, api::state::ApiState};

/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

fn event_json(event: &CheckEvent) -> serde_json::Value {
    serde_json::json!({
        "type": "service_check",
        "service_name": event.target,
        "category": event.category,
        "previous": event.previous,
        "status": event.status,
        "timestamp": event.outcome.timestamp.to_rfc3339(),
        "response_time_ms": event.outcome.response_time_ms,
        "http_status_code": event.outcome.status_code,
        "error_message": event.outcome.error,
    })
}

async fn handle_websocket(socket: WebSocket, state: ApiState) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.monitor.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let text = event_json(&event).to_string();
                    if sender.send(Message::Text(text)).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagging, skipped {skipped} events");
                }
                Err(RecvError::Closed) => {
                    debug!("event channel closed");
                    break;
                }
            }
        }
    });

    // clients only ever close; anything else is ignored
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
