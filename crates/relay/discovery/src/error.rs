//! Discovery error types

use crate::discovery::InstanceId;
use thiserror::Error;

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Instance already registered: {0}")]
    InstanceAlreadyExists(InstanceId),

    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Invalid service name: '{0}'")]
    InvalidServiceName(String),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
