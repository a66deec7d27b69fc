// Shared between test binaries; not every helper is used by each one.
#![allow(dead_code)]

use std::sync::Arc;

use seamline_core::MemoryScanStore;
use seamline_core::protocol::{DeviceFrame, TopicFrame};
use seamline_model::ConnectionRole;
use seamline_server::AppState;
use seamline_server::infra::config::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, IngestConfig, ServerConfig,
};
use seamline_server::infra::ws::connection::{Connection, DashboardConnection, DeviceConnection};
use tokio::sync::mpsc;

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryScanStore>,
}

pub fn test_config() -> Arc<Config> {
    Arc::new(Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseConfig { url: None },
        ingest: IngestConfig {
            idle_timeout_secs: 300,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_string()],
        },
        metadata: ConfigMetadata::default(),
    })
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_store(Arc::new(MemoryScanStore::new()))
}

pub fn build_test_app_with_store(store: Arc<MemoryScanStore>) -> TestApp {
    let state = AppState::new(store.clone(), test_config());
    TestApp { state, store }
}

/// Register a channel-backed device connection, standing in for one
/// reader session on the ingestion transport.
pub fn attach_device(state: &AppState) -> (Arc<DeviceConnection>, mpsc::Receiver<DeviceFrame>) {
    let (tx, rx) = mpsc::channel(32);
    let connection = Arc::new(Connection::new(ConnectionRole::Device, None, tx));
    state.devices.register(connection.clone());
    (connection, rx)
}

/// Register a channel-backed dashboard connection on the pub/sub
/// transport.
pub fn attach_dashboard(
    state: &AppState,
) -> (Arc<DashboardConnection>, mpsc::Receiver<TopicFrame>) {
    let (tx, rx) = mpsc::channel(32);
    let connection = Arc::new(Connection::new(ConnectionRole::Dashboard, None, tx));
    state.dashboards.register(connection.clone());
    (connection, rx)
}

/// A well-formed `rfid_scan` frame for the given scan id.
pub fn scan_frame(id: &str) -> String {
    format!(
        r#"{{"action":"rfid_scan","data":{{"id":"{id}","tagId":"T1","stationId":"ST1","timestamp":1000}}}}"#
    )
}
