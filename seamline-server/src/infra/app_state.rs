use std::{fmt, sync::Arc};

use seamline_core::ScanStore;

use crate::infra::config::Config;
use crate::infra::ws::{DashboardRegistry, DeviceRegistry};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScanStore>,
    pub devices: Arc<DeviceRegistry>,
    pub dashboards: Arc<DashboardRegistry>,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(store: Arc<dyn ScanStore>, config: Arc<Config>) -> Self {
        Self {
            store,
            devices: Arc::new(DeviceRegistry::new()),
            dashboards: Arc::new(DashboardRegistry::new()),
            config,
        }
    }
}
