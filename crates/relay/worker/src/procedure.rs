//! Procedure contract
//!
//! A procedure declares its input shape through the associated `Params` type.
//! The registry captures that type at registration, so the dispatcher never
//! inspects executors at runtime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_types::{Envelope, ExecutionMetadata, RequestId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure raised by a procedure's own logic.
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// Input was well-formed but violates a business rule.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),
}

/// Per-call context handed to an executor.
///
/// Built fresh for every envelope; anything tenant- or call-scoped should be
/// derived from it inside `execute` and never cached across calls.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: RequestId,
    pub procedure: String,
    pub metadata: ExecutionMetadata,
    pub received_at: DateTime<Utc>,
}

impl InvocationContext {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            request_id: envelope.request_id,
            procedure: envelope.procedure_name.clone(),
            metadata: envelope.metadata.clone(),
            received_at: Utc::now(),
        }
    }
}

/// Declared input shape of a procedure, for diagnostics and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape(&'static str);

impl InputShape {
    pub fn of<T: ?Sized>() -> Self {
        let full = std::any::type_name::<T>();
        let short = match full.find('<') {
            Some(generic_start) => {
                let head = &full[..generic_start];
                let start = head.rfind("::").map(|i| i + 2).unwrap_or(0);
                &full[start..]
            }
            None => full.rsplit("::").next().unwrap_or(full),
        };
        Self(short)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A named unit of business logic hosted by a worker pool.
///
/// Executors are shared across concurrent dispatches and must be safe to call
/// from several tasks at once.
#[async_trait]
pub trait Procedure: Send + Sync + 'static {
    type Params: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    async fn execute(
        &self,
        params: Self::Params,
        ctx: InvocationContext,
    ) -> Result<Self::Output, ProcedureError>;

    fn input_shape(&self) -> InputShape {
        InputShape::of::<Self::Params>()
    }
}
