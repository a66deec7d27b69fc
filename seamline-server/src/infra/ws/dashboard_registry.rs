use crate::infra::ws::connection::DashboardConnection;
use dashmap::DashMap;
use seamline_core::protocol::TopicFrame;
use std::{fmt, sync::Arc};
use uuid::Uuid;

/// Registry of live dashboard connections.
///
/// Every dashboard implicitly subscribes to all topics on connect, so
/// `publish` is the single operation the change-feed broadcaster needs:
/// push one frame to every open subscriber. Explicit snapshot pulls are
/// answered by the dashboard handler directly to the requesting
/// connection and never go through here.
#[derive(Default)]
pub struct DashboardRegistry {
    connections: DashMap<Uuid, Arc<DashboardConnection>>,
}

impl fmt::Debug for DashboardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardRegistry")
            .field("subscriber_count", &self.connections.len())
            .finish()
    }
}

impl DashboardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection: Arc<DashboardConnection>) {
        self.connections.insert(connection.id, connection);
    }

    pub fn unregister(&self, conn_id: Uuid) -> Option<Arc<DashboardConnection>> {
        self.connections.remove(&conn_id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Push a topic frame to every open subscriber. Returns how many
    /// subscribers the frame was handed to.
    pub async fn publish(&self, frame: TopicFrame) -> usize {
        let subscribers: Vec<Arc<DashboardConnection>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut delivered = 0;
        for subscriber in subscribers {
            if !subscriber.is_open().await {
                continue;
            }
            if let Err(e) = subscriber.send(frame.clone()).await {
                tracing::warn!(connection = %subscriber.id, "Failed to send topic frame: {}", e);
            } else {
                delivered += 1;
            }
        }
        delivered
    }
}
