//! Device ingestion transport.
//!
//! RFID readers hold a WebSocket open on `/rfid-ws`. Frames on one
//! connection are handled sequentially in receipt order; different
//! connections run concurrently. Every accepted scan causes exactly one
//! store write and, on success, one direct-broadcast pass to the other
//! readers. A failed write is reported to the caller, never retried here.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use seamline_core::StoreError;
use seamline_core::protocol::{
    ACTION_PING, ACTION_RFID_SCAN, DeviceFrame, ERROR_DATABASE, ERROR_DUPLICATE,
    ERROR_INVALID_JSON, ERROR_UNKNOWN_ACTION, ERROR_VALIDATION, InboundMessage,
    parse_scan_payload,
};
use seamline_model::{ConnectionRole, ConnectionState};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::infra::{
    app_state::AppState,
    ws::connection::{Connection, DeviceConnection},
};

/// Handle WebSocket upgrade request from a reader
pub async fn device_ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Handle an individual reader connection
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<DeviceFrame>(100);

    let connection = Arc::new(Connection::new(ConnectionRole::Device, Some(addr), tx));
    let conn_id = connection.id;

    state.devices.register(connection.clone());
    info!(connection = %conn_id, remote = %addr, "device connected");

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
                    error!(connection = %conn_id, "Failed to serialize frame: {}", e);
                }
            }
        }
    });

    // Acknowledge the connection without waiting for any caller action
    if connection.send(DeviceFrame::connection_ack()).await.is_err() {
        warn!(connection = %conn_id, "device went away before acknowledgement");
    }

    let idle_window = state.config.ingest.idle_timeout();

    // Handle incoming frames sequentially; one frame is processed to
    // completion before the next on this connection.
    loop {
        let next = match idle_window {
            Some(window) => match tokio::time::timeout(window, ws_receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!(connection = %conn_id, "closing idle device connection");
                    connection.set_state(ConnectionState::Closing).await;
                    break;
                }
            },
            None => ws_receiver.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                process_device_frame(&state, &connection, text.as_str()).await;
            }
            Some(Ok(Message::Binary(bin))) => match std::str::from_utf8(bin.as_ref()) {
                Ok(text) => process_device_frame(&state, &connection, text).await,
                Err(e) => {
                    respond(
                        &connection,
                        DeviceFrame::error(
                            ERROR_INVALID_JSON,
                            format!("frame is not valid UTF-8: {e}"),
                        ),
                    )
                    .await;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                connection.touch().await;
            }
            Some(Ok(Message::Close(frame))) => {
                match frame {
                    Some(close) => info!(
                        connection = %conn_id,
                        code = u16::from(close.code),
                        reason = %close.reason,
                        "device closed connection"
                    ),
                    None => info!(connection = %conn_id, "device closed connection"),
                }
                break;
            }
            Some(Err(e)) => {
                error!(connection = %conn_id, "WebSocket error: {}", e);
                break;
            }
            None => break,
        }
    }

    // Clean up on disconnect; no event is synthesized for the departure
    connection.set_state(ConnectionState::Closed).await;
    state.devices.unregister(conn_id);
    info!(connection = %conn_id, "device disconnected");
}

/// Decode one raw device frame and dispatch it by action. Every outcome,
/// success or failure, is reported back on the same connection.
pub async fn process_device_frame(
    state: &AppState,
    connection: &Arc<DeviceConnection>,
    raw: &str,
) {
    connection.touch().await;

    let message = match InboundMessage::parse(raw) {
        Ok(message) => message,
        Err(e) => {
            respond(
                connection,
                DeviceFrame::error(ERROR_INVALID_JSON, format!("could not parse frame: {e}")),
            )
            .await;
            return;
        }
    };

    match message.action.as_str() {
        ACTION_RFID_SCAN => handle_scan(state, connection, &message.data).await,
        ACTION_PING => respond(connection, DeviceFrame::pong()).await,
        other => {
            respond(
                connection,
                DeviceFrame::error(ERROR_UNKNOWN_ACTION, format!("unsupported action {other:?}")),
            )
            .await;
        }
    }
}

/// Validate, persist and fan out one scan submission.
async fn handle_scan(state: &AppState, connection: &Arc<DeviceConnection>, data: &Value) {
    let event = match parse_scan_payload(data) {
        Ok(event) => event,
        Err(missing) => {
            respond(
                connection,
                DeviceFrame::error(
                    ERROR_VALIDATION,
                    format!("missing required fields: {}", missing.join(", ")),
                ),
            )
            .await;
            return;
        }
    };

    match state.store.insert_scan(&event).await {
        Ok(record) => {
            respond(connection, DeviceFrame::scan_success(&record)).await;

            let delivered = state
                .devices
                .broadcast_except(DeviceFrame::scan_broadcast(&record), connection.id)
                .await;
            debug!(scan = %record.event.id, delivered, "scan broadcast to peers");
        }
        Err(StoreError::Duplicate { id }) => {
            respond(
                connection,
                DeviceFrame::error(ERROR_DUPLICATE, format!("scan id {id} already exists")),
            )
            .await;
        }
        Err(e) => {
            // Full detail stays server-side; the device gets a generic reply.
            error!(scan = %event.id, "Failed to persist scan: {}", e);
            respond(
                connection,
                DeviceFrame::error(ERROR_DATABASE, "failed to save scan data"),
            )
            .await;
        }
    }
}

async fn respond(connection: &Arc<DeviceConnection>, frame: DeviceFrame) {
    if let Err(e) = connection.send(frame).await {
        warn!(connection = %connection.id, "Failed to send response frame: {}", e);
    }
}
