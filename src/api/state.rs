use std::sync::Arc;

use crate::config::Config;
use crate::ledger::JobRecordStore;
use crate::observability::Metrics;
use crate::queue::JobDispatcher;
use crate::worker::DiskUsage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn JobRecordStore>,
    pub dispatcher: Arc<JobDispatcher>,
    pub disk: Arc<dyn DiskUsage>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn JobRecordStore>,
        dispatcher: JobDispatcher,
        disk: Arc<dyn DiskUsage>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher: Arc::new(dispatcher),
            disk,
            metrics,
        }
    }

    /// Signing secret; empty only when the server was built without one
    pub fn token(&self) -> &str {
        self.config.server.token.as_deref().unwrap_or_default()
    }
}
