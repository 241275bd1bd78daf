//! Error types for relay-gateway.
//!
//! These are transport-level outcomes. A procedure that ran and failed is not
//! an error here; it arrives as a `Response` with `success: false`.

use relay_types::RequestId;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Service '{service}' not found")]
    ServiceNotFound {
        service: String,
        known_services: Vec<String>,
    },

    #[error("Failed to send request {request_id} to topic {topic}: {reason}")]
    BrokerPublish {
        request_id: RequestId,
        topic: String,
        reason: String,
    },

    #[error("Request {request_id} timed out after {timeout_ms} ms")]
    Timeout {
        request_id: RequestId,
        timeout_ms: u64,
    },

    #[error("Request {request_id} was interrupted before completion")]
    Interrupted { request_id: RequestId },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request {0} is already in flight")]
    DuplicateRequest(RequestId),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl GatewayError {
    /// Request id the error belongs to, when one was allocated.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::BrokerPublish { request_id, .. }
            | Self::Timeout { request_id, .. }
            | Self::Interrupted { request_id } => Some(*request_id),
            Self::DuplicateRequest(request_id) => Some(*request_id),
            Self::ServiceNotFound { .. } | Self::InvalidRequest(_) | Self::Encoding(_) => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ServiceNotFound { .. } => "SERVICE_NOT_FOUND",
            Self::BrokerPublish { .. } => "BROKER_PUBLISH_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Interrupted { .. } => "INTERRUPTED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::DuplicateRequest(_) => "DUPLICATE_REQUEST",
            Self::Encoding(_) => "ENCODING_ERROR",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
