//! Procedure call handlers

use crate::api::rest::state::{AppState, PoolInfo};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use relay_types::{ExecutionMetadata, ProcedureCall, Response};
use tracing::info;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ORGANIZATION_ID_HEADER: &str = "x-organization-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Caller identity from headers set by the authenticating proxy.
pub fn identity_from_headers(headers: &HeaderMap) -> ExecutionMetadata {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let tenant_id = header(TENANT_ID_HEADER).or_else(|| header(ORGANIZATION_ID_HEADER));
    let mut metadata = ExecutionMetadata::new(header(USER_ID_HEADER), tenant_id);
    if let Some(correlation_id) = header(CORRELATION_ID_HEADER) {
        metadata = metadata.with_header(CORRELATION_ID_HEADER, correlation_id);
    }
    metadata
}

fn call_from_body(body: Result<Json<ProcedureCall>, JsonRejection>) -> ApiResult<ProcedureCall> {
    body.map(|Json(call)| call)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Execute a procedure and wait for its response
pub async fn execute_procedure(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ProcedureCall>, JsonRejection>,
) -> ApiResult<Json<Response>> {
    let call = call_from_body(body)?;
    let metadata = identity_from_headers(&headers);
    info!(
        client_type = %call.client_type,
        procedure = %call.procedure_name,
        user_id = ?metadata.user_id,
        tenant_id = ?metadata.tenant_id,
        "Procedure execution requested"
    );

    let response = state.router.submit(call, metadata).await?;
    Ok(Json(response))
}

/// Execute a procedure on a background task
pub async fn execute_procedure_async(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ProcedureCall>, JsonRejection>,
) -> ApiResult<Json<Response>> {
    let call = call_from_body(body)?;
    let metadata = identity_from_headers(&headers);

    let pending = state.router.submit_async(call, metadata);
    info!(request_id = %pending.request_id(), "Async procedure execution started");

    let response = pending.await?;
    Ok(Json(response))
}

/// List procedures hosted by the embedded worker pools
pub async fn list_procedures(State(state): State<AppState>) -> Json<Vec<PoolInfo>> {
    Json(state.pools.as_ref().clone())
}
