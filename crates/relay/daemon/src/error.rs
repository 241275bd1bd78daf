//! Error types for relay-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_discovery::DiscoveryError;
use relay_gateway::GatewayError;
use relay_transport::BrokerError;
use relay_worker::{RegistryError, WorkerError};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// The call produced no response
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Malformed request body
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(err) => match err {
                GatewayError::ServiceNotFound { .. } | GatewayError::BrokerPublish { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                GatewayError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
                GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                GatewayError::DuplicateRequest(_) => StatusCode::CONFLICT,
                GatewayError::Interrupted { .. } | GatewayError::Encoding(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Gateway(err) => err.code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub success: bool,
    pub error_message: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = match &self {
            ApiError::Gateway(err) => err.request_id().map(|id| id.to_string()),
            ApiError::BadRequest(_) => None,
        };

        let body = ErrorResponse {
            request_id,
            success: false,
            error_message: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
