//! Wiring of the core components for one CLI invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use rollcall_core::{
    ApiClient, AttendanceRecorder, Config, ConnectivityMonitor, DataLoader, FileStorage,
    LocalStore, NetworkStatus, PendingQueue, Storage, SyncEngine,
};

pub struct App {
    pub config: Config,
    pub client: Arc<ApiClient>,
    pub store: LocalStore,
    pub engine: SyncEngine,
    pub monitor: Arc<ConnectivityMonitor>,
    pub loader: DataLoader,
    pub recorder: AttendanceRecorder,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        debug!(?data_dir, "Data directory configured");

        let storage: Arc<dyn Storage> = Arc::new(
            FileStorage::new(data_dir.clone())
                .with_context(|| format!("Cannot open data directory {}", data_dir.display()))?,
        );
        let store = LocalStore::new(storage.clone(), config.namespace.clone());
        let queue = Arc::new(PendingQueue::new(storage, &config.namespace));

        let client = Arc::new(ApiClient::new(config.api_base_url.clone(), config.request_timeout())?);
        let engine = SyncEngine::new(queue, client.clone(), config.sync_options());
        let monitor = Arc::new(ConnectivityMonitor::default());
        let loader = DataLoader::new(client.clone(), store.clone());
        let recorder = AttendanceRecorder::new(engine.clone(), monitor.clone());

        Ok(Self {
            config,
            client,
            store,
            engine,
            monitor,
            loader,
            recorder,
        })
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        self.engine.queue()
    }

    /// Probe the server once and report the result to the monitor.
    /// Returns whether the status changed.
    pub async fn probe(&self) -> bool {
        let status = if self.client.is_reachable().await {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        };
        self.monitor.set_status(status)
    }
}
