//! Error types for relay-worker.

use crate::coercion::CoercionError;
use relay_transport::BrokerError;
use thiserror::Error;

/// Business-level outcome of a failed dispatch.
///
/// The `Display` text is what the caller receives as `errorMessage`.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No procedure registered under this name.
    #[error("Procedure '{0}' not found")]
    ProcedureNotFound(String),

    /// Parameters do not match the declared input shape.
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// The executor failed, panicked or overran its budget.
    #[error("Error executing procedure '{procedure}': {reason}")]
    Execution { procedure: String, reason: String },
}

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("procedure '{0}' registered more than once")]
    DuplicateProcedure(String),

    #[error("procedure name must not be empty")]
    EmptyName,

    #[error("unknown built-in procedure '{0}'")]
    UnknownBuiltin(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while starting a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid worker configuration: {0}")]
    InvalidConfig(String),

    #[error("subscription failed: {0}")]
    Subscribe(#[from] BrokerError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
