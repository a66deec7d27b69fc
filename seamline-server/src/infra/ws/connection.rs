use anyhow::Result;
use seamline_model::{ConnectionRole, ConnectionState};
use seamline_core::protocol::{DeviceFrame, TopicFrame};
use std::{fmt, net::SocketAddr};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// One live transport session, generic over the outbound frame type so
/// the device and dashboard transports share the same lifecycle code.
pub struct Connection<M> {
    /// Unique connection ID
    pub id: Uuid,
    /// Transport this connection belongs to
    pub role: ConnectionRole,
    /// Peer address as reported at accept time
    pub remote_addr: Option<SocketAddr>,
    /// Lifecycle state; broadcasts only target `Open` connections
    state: RwLock<ConnectionState>,
    /// Channel to send frames to this connection
    sender: mpsc::Sender<M>,
    /// Last activity timestamp for connection health
    last_seen: RwLock<i64>,
}

/// Outbound handle for an RFID reader session.
pub type DeviceConnection = Connection<DeviceFrame>;
/// Outbound handle for a dashboard session.
pub type DashboardConnection = Connection<TopicFrame>;

impl<M> fmt::Debug for Connection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.try_read().ok().map(|guard| *guard);
        let last_seen = self.last_seen.try_read().ok().map(|guard| *guard);

        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("remote_addr", &self.remote_addr)
            .field("state", &state)
            .field("channel_closed", &self.sender.is_closed())
            .field("last_seen", &last_seen)
            .finish()
    }
}

impl<M> Connection<M> {
    pub fn new(
        role: ConnectionRole,
        remote_addr: Option<SocketAddr>,
        sender: mpsc::Sender<M>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            remote_addr,
            state: RwLock::new(ConnectionState::Open),
            sender,
            last_seen: RwLock::new(chrono::Utc::now().timestamp()),
        }
    }

    /// Send a frame to this connection
    pub async fn send(&self, frame: M) -> Result<()> {
        self.sender
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("Failed to send frame: channel closed"))
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    pub async fn is_open(&self) -> bool {
        self.state().await.is_open()
    }

    /// Update last activity timestamp
    pub async fn touch(&self) {
        *self.last_seen.write().await = chrono::Utc::now().timestamp();
    }

    pub async fn last_seen(&self) -> i64 {
        *self.last_seen.read().await
    }
}
