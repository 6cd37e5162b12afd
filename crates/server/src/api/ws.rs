//! WebSocket endpoint for real-time conversion progress.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use morpho_core::ProgressEvent;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Message sent to clients over the progress socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsOutbound {
    /// A progress update for the subscribed job.
    Progress {
        job_id: String,
        progress: u8,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl From<ProgressEvent> for WsOutbound {
    fn from(event: ProgressEvent) -> Self {
        WsOutbound::Progress {
            job_id: event.job_id,
            progress: event.progress,
            status: event.status.to_string(),
            error: event.error,
        }
    }
}

/// Messages a client may send; only liveness pings carry meaning.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsInbound {
    Ping {
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

/// WebSocket upgrade handler for `/ws/jobs/{id}`.
pub async fn progress_ws_handler(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

/// Handle a single progress subscription.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, job_id: String) {
    let mut rx = state.service().subscribe(&job_id).await;

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(job_id = %job_id, "Progress subscriber connected");

    loop {
        tokio::select! {
            // Forward progress events for this job to the client
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        WS_MESSAGES_SENT.with_label_values(&["progress"]).inc();
                        let outbound = WsOutbound::from(event);
                        match serde_json::to_string(&outbound) {
                            Ok(text) => {
                                if socket.send(Message::Text(text.into())).await.is_err() {
                                    debug!("WebSocket send failed, client disconnected");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to serialize progress event: {}", e);
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(job_id = %job_id, "Progress subscriber lagged, skipped {} events", n);
                        WS_LAG_EVENTS.inc();
                        // Continue receiving - the client will catch up
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Progress channel closed");
                        break;
                    }
                }
            }
            // Handle client messages (liveness pings, close)
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(WsInbound::Ping { timestamp }) =
                            serde_json::from_str::<WsInbound>(&text)
                        {
                            WS_MESSAGES_SENT.with_label_values(&["pong"]).inc();
                            let pong = json!({ "type": "pong", "timestamp": timestamp });
                            if socket
                                .send(Message::Text(pong.to_string().into()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ignore binary/ping/pong frames
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    WS_CONNECTIONS_ACTIVE.dec();
    info!(job_id = %job_id, "Progress subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpho_core::JobStatus;

    #[test]
    fn test_outbound_wire_format() {
        let event = ProgressEvent {
            job_id: "job-1".to_string(),
            progress: 30,
            status: JobStatus::Processing,
            error: None,
        };
        let json = serde_json::to_string(&WsOutbound::from(event)).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"progress\":30"));
        assert!(json.contains("\"status\":\"processing\""));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_inbound_ping_parses() {
        let inbound: WsInbound =
            serde_json::from_str("{\"type\":\"ping\",\"timestamp\":123}").unwrap();
        let WsInbound::Ping { timestamp } = inbound;
        assert_eq!(timestamp, Some(123));
    }

    #[test]
    fn test_inbound_unknown_type_rejected() {
        assert!(serde_json::from_str::<WsInbound>("{\"type\":\"subscribe\"}").is_err());
    }
}
