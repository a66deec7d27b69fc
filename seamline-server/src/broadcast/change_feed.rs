//! Store-driven dashboard fan-out.
//!
//! The second of the two decoupled broadcast paths: while the ingestion
//! handler pushes to peer readers directly, this task watches the store's
//! change-notification feed and refreshes every dashboard with the full
//! current record set, so dashboards stay consistent even when writes
//! originate elsewhere (bulk imports, administrative edits).

use std::sync::Arc;

use seamline_core::protocol::TopicFrame;
use seamline_core::{ScanStore, StoreError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::infra::ws::DashboardRegistry;

pub struct ChangeFeedBroadcaster {
    store: Arc<dyn ScanStore>,
    dashboards: Arc<DashboardRegistry>,
}

impl std::fmt::Debug for ChangeFeedBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeedBroadcaster")
            .finish_non_exhaustive()
    }
}

impl ChangeFeedBroadcaster {
    pub fn new(store: Arc<dyn ScanStore>, dashboards: Arc<DashboardRegistry>) -> Self {
        Self { store, dashboards }
    }

    /// Subscribe to the change feed and run the watch loop for the life
    /// of the process. Returns `None` when the subscription cannot be
    /// established; the rest of the system keeps serving without live
    /// dashboard pushes.
    pub async fn start(self) -> Option<JoinHandle<()>> {
        let mut feed = match self.store.subscribe_changes().await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(
                    "change feed unavailable, dashboards will not receive live snapshots: {}",
                    e
                );
                return None;
            }
        };

        Some(tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    // One push per notification, reflecting store state at
                    // query time; deltas are never computed.
                    Ok(change) => {
                        debug!(?change, "store changed, refreshing dashboards");
                        if let Err(e) = self.push_snapshot().await {
                            error!("snapshot refresh failed, continuing to watch: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed lagged, pushing fresh snapshot");
                        if let Err(e) = self.push_snapshot().await {
                            error!("snapshot refresh failed, continuing to watch: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => {
                        info!("change feed closed, stopping dashboard fan-out");
                        break;
                    }
                }
            }
        }))
    }

    async fn push_snapshot(&self) -> Result<(), StoreError> {
        let records = self.store.list_scans().await?;
        let delivered = self
            .dashboards
            .publish(TopicFrame::scan_snapshot(&records))
            .await;
        debug!(
            records = records.len(),
            delivered, "pushed dashboard snapshot"
        );
        Ok(())
    }
}
