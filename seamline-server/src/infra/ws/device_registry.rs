use crate::infra::ws::connection::DeviceConnection;
use dashmap::DashMap;
use seamline_core::protocol::DeviceFrame;
use std::{fmt, sync::Arc};
use uuid::Uuid;

/// Registry of live RFID reader connections.
///
/// Owned by the ingestion listener and injected through `AppState`; no
/// ambient module-level connection set exists. Peer broadcast is
/// best-effort: non-open connections are skipped and send failures are
/// logged, never retried.
#[derive(Default)]
pub struct DeviceRegistry {
    connections: DashMap<Uuid, Arc<DeviceConnection>>,
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("connection_count", &self.connections.len())
            .finish()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection
    pub fn register(&self, connection: Arc<DeviceConnection>) {
        self.connections.insert(connection.id, connection);
    }

    /// Remove a connection on disconnect or close
    pub fn unregister(&self, conn_id: Uuid) -> Option<Arc<DeviceConnection>> {
        self.connections.remove(&conn_id).map(|(_, conn)| conn)
    }

    pub fn get(&self, conn_id: &Uuid) -> Option<Arc<DeviceConnection>> {
        self.connections.get(conn_id).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send a frame to every other open device connection. Returns how
    /// many peers the frame was handed to.
    pub async fn broadcast_except(&self, frame: DeviceFrame, origin: Uuid) -> usize {
        let peers: Vec<Arc<DeviceConnection>> = self
            .connections
            .iter()
            .filter(|entry| *entry.key() != origin)
            .map(|entry| entry.value().clone())
            .collect();

        let mut delivered = 0;
        for peer in peers {
            if !peer.is_open().await {
                continue;
            }
            if let Err(e) = peer.send(frame.clone()).await {
                tracing::warn!(connection = %peer.id, "Failed to send broadcast frame: {}", e);
            } else {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ws::connection::Connection;
    use seamline_core::protocol::{FRAME_RFID_SCAN_BROADCAST, FrameStatus};
    use seamline_model::{ConnectionRole, ConnectionState};
    use tokio::sync::mpsc;

    fn device() -> (Arc<DeviceConnection>, mpsc::Receiver<DeviceFrame>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Arc::new(Connection::new(ConnectionRole::Device, None, tx)),
            rx,
        )
    }

    fn broadcast_frame() -> DeviceFrame {
        DeviceFrame {
            frame_type: FRAME_RFID_SCAN_BROADCAST.to_string(),
            status: FrameStatus::Info,
            data: None,
            error: None,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn broadcast_skips_the_origin() {
        let registry = DeviceRegistry::new();
        let (origin, mut origin_rx) = device();
        let (peer, mut peer_rx) = device();
        registry.register(origin.clone());
        registry.register(peer.clone());

        let delivered = registry.broadcast_except(broadcast_frame(), origin.id).await;

        assert_eq!(delivered, 1);
        assert!(peer_rx.try_recv().is_ok());
        assert!(origin_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_non_open_connections() {
        let registry = DeviceRegistry::new();
        let (origin, _origin_rx) = device();
        let (closing, mut closing_rx) = device();
        closing.set_state(ConnectionState::Closing).await;
        registry.register(origin.clone());
        registry.register(closing.clone());

        let delivered = registry.broadcast_except(broadcast_frame(), origin.id).await;

        assert_eq!(delivered, 0);
        assert!(closing_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_removes_the_connection() {
        let registry = DeviceRegistry::new();
        let (conn, _rx) = device();
        registry.register(conn.clone());
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(conn.id).is_some());
        assert!(registry.is_empty());
        assert!(registry.get(&conn.id).is_none());
    }
}
