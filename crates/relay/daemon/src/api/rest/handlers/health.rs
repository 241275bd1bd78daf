//! Health handler

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use relay_gateway::PendingStats;
use serde::Serialize;
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub instance_id: String,
    pub reply_topic: String,
    pub pending: PendingStats,
    pub services: Vec<String>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let services = state.discovery.list_services().await.unwrap_or_else(|e| {
        warn!(error = %e, "Could not list services for health check");
        Vec::new()
    });
    let config = state.router.config();

    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        instance_id: config.instance_id().to_string(),
        reply_topic: config.reply_topic().to_string(),
        pending: state.router.pending().stats(),
        services,
    })
}
