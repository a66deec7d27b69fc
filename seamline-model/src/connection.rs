use serde::{Deserialize, Serialize};

/// Which transport a live connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    /// An RFID reader on the ingestion transport.
    Device,
    /// A dashboard client on the publish/subscribe transport.
    Dashboard,
}

/// Lifecycle state of a transport session.
///
/// Broadcasts only target `Open` connections; the other states are
/// silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}
