//! Dashboard publish/subscribe transport.
//!
//! Dashboards connect on `/dashboard-ws` and are implicitly subscribed to
//! every topic for the life of the connection. Pushes arrive from the
//! change-feed broadcaster; the only inbound request served here is an
//! explicit snapshot pull, answered to the requester alone. Dashboards
//! have no error visibility for this pipeline, so unusable inbound frames
//! are logged and dropped rather than answered.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use seamline_core::protocol::{ACTION_REQUEST_SNAPSHOT, InboundMessage, TopicFrame};
use seamline_model::{ConnectionRole, ConnectionState};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::infra::{
    app_state::AppState,
    ws::connection::{Connection, DashboardConnection},
};

/// Handle WebSocket upgrade request from a dashboard
pub async fn dashboard_ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<TopicFrame>(100);

    let connection = Arc::new(Connection::new(ConnectionRole::Dashboard, Some(addr), tx));
    let conn_id = connection.id;

    state.dashboards.register(connection.clone());
    info!(connection = %conn_id, remote = %addr, "dashboard subscribed");

    // Spawn task to handle outgoing frames
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if ws_sender
                        .send(Message::Text(Utf8Bytes::from(json)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    error!(connection = %conn_id, "Failed to serialize topic frame: {}", e);
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                process_dashboard_frame(&state, &connection, text.as_str()).await;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                connection.touch().await;
            }
            Ok(Message::Close(frame)) => {
                match frame {
                    Some(close) => info!(
                        connection = %conn_id,
                        code = u16::from(close.code),
                        reason = %close.reason,
                        "dashboard closed connection"
                    ),
                    None => info!(connection = %conn_id, "dashboard closed connection"),
                }
                break;
            }
            Err(e) => {
                error!(connection = %conn_id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    connection.set_state(ConnectionState::Closed).await;
    state.dashboards.unregister(conn_id);
    info!(connection = %conn_id, "dashboard unsubscribed");
}

/// Serve an explicit snapshot pull to the requesting dashboard only.
/// This is the pull path; it never fans out to other subscribers.
pub async fn process_dashboard_frame(
    state: &AppState,
    connection: &Arc<DashboardConnection>,
    raw: &str,
) {
    connection.touch().await;

    match InboundMessage::parse(raw) {
        Ok(message) if message.action == ACTION_REQUEST_SNAPSHOT => {
            match state.store.list_scans().await {
                Ok(records) => {
                    if let Err(e) = connection.send(TopicFrame::scan_snapshot(&records)).await {
                        debug!(connection = %connection.id, "Failed to send snapshot: {}", e);
                    }
                }
                Err(e) => {
                    error!(connection = %connection.id, "snapshot query failed: {}", e);
                }
            }
        }
        Ok(message) => {
            debug!(connection = %connection.id, action = %message.action, "ignoring dashboard frame");
        }
        Err(e) => {
            debug!(connection = %connection.id, "ignoring unparseable dashboard frame: {}", e);
        }
    }
}
