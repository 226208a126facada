//! Application context: every shared service, constructed once at startup
//! and passed into handlers as axum state. No module-scoped singletons.

use crate::config::Config;
use crate::db::Database;
use crate::logbus::LogBus;
use crate::pipeline::sessions::StreamSessions;
use crate::supervisor::{PortAllocator, ProcessSupervisor, SupervisorConfig};
use crate::tools::ToolRegistry;
use crate::workspace::{StoreError, WorkspaceStore};
use appforge::provider::{ChatProvider, ProviderSpec};
use appforge::ProviderError;
use std::sync::Arc;

/// Builds a chat provider for one generation run. Swappable in tests.
pub type ProviderFactory =
    Box<dyn Fn(&ProviderSpec) -> Result<Box<dyn ChatProvider>, ProviderError> + Send + Sync>;

pub struct AppContext {
    pub config: Config,
    pub db: Database,
    pub bus: Arc<LogBus>,
    pub supervisor: ProcessSupervisor,
    pub sessions: StreamSessions,
    pub tools: ToolRegistry,
    pub providers: ProviderFactory,
    pub http: reqwest::Client,
}

impl AppContext {
    pub fn new(config: Config, db: Database) -> Self {
        let bus = Arc::new(LogBus::new());
        let ports = PortAllocator::new(config.dev_port_base(), config.max_workspaces);
        let supervisor = ProcessSupervisor::new(
            SupervisorConfig::from_service_config(&config),
            ports,
            bus.clone(),
        );

        Self {
            config,
            db,
            bus,
            supervisor,
            sessions: StreamSessions::new(),
            tools: ToolRegistry::builtin(),
            providers: Box::new(|spec| appforge::provider::build_provider(spec)),
            http: reqwest::Client::new(),
        }
    }

    #[cfg(test)]
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.providers = factory;
        self
    }

    /// The file store rooted at this user's workspace for `app_id`.
    pub fn store_for(&self, user_id: i64, app_id: i64) -> Result<WorkspaceStore, StoreError> {
        WorkspaceStore::open(&self.config.storage_path, user_id, app_id)
    }

    /// Release every process-lifetime resource. Called on shutdown.
    pub async fn shutdown(&self) {
        self.sessions.cancel_all();
        self.supervisor.stop_all().await;
    }
}
