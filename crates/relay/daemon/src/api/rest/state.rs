//! Application state for API handlers

use relay_discovery::ServiceDiscovery;
use relay_gateway::ProcedureRouter;
use relay_worker::ProcedureDescriptor;
use serde::Serialize;
use std::sync::Arc;

/// Procedures hosted by one embedded worker pool
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub service: String,
    pub topics: Vec<String>,
    pub replicas: usize,
    pub concurrency: usize,
    pub procedures: Vec<ProcedureDescriptor>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gateway entry point
    pub router: ProcedureRouter,

    /// Service registry, for the health endpoint
    pub discovery: Arc<dyn ServiceDiscovery>,

    /// Embedded worker pools
    pub pools: Arc<Vec<PoolInfo>>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        router: ProcedureRouter,
        discovery: Arc<dyn ServiceDiscovery>,
        pools: Vec<PoolInfo>,
    ) -> Self {
        Self {
            router,
            discovery,
            pools: Arc::new(pools),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
