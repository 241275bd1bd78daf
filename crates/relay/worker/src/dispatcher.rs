//! Envelope dispatch
//!
//! Lookup, coercion and execution of a single envelope. Every path ends in a
//! [`Response`]; nothing escapes to the consumer loop.

use crate::coercion::ParameterCoercer;
use crate::error::DispatchError;
use crate::procedure::InvocationContext;
use crate::registry::ProcedureRegistry;
use relay_types::{Envelope, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Routes envelopes to registered procedures.
#[derive(Clone)]
pub struct ProcedureDispatcher {
    registry: Arc<ProcedureRegistry>,
    coercer: ParameterCoercer,
    execution_timeout: Option<Duration>,
}

impl ProcedureDispatcher {
    pub fn new(registry: Arc<ProcedureRegistry>) -> Self {
        Self {
            registry,
            coercer: ParameterCoercer::new(),
            execution_timeout: None,
        }
    }

    pub fn with_coercer(mut self, coercer: ParameterCoercer) -> Self {
        self.coercer = coercer;
        self
    }

    /// Bound each execution; overruns become execution errors.
    pub fn with_execution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProcedureRegistry {
        &self.registry
    }

    /// Produce the response for `envelope`.
    #[instrument(
        skip(self, envelope),
        fields(request_id = %envelope.request_id, procedure = %envelope.procedure_name)
    )]
    pub async fn dispatch(&self, envelope: Envelope) -> Response {
        let request_id = envelope.request_id;

        match self.try_dispatch(envelope).await {
            Ok(result) => {
                info!("Procedure completed");
                Response::success(request_id, result)
            }
            Err(err) => {
                warn!(error = %err, "Procedure failed");
                Response::failure(request_id, err.to_string())
            }
        }
    }

    async fn try_dispatch(&self, envelope: Envelope) -> Result<Value, DispatchError> {
        let entry = self
            .registry
            .get(&envelope.procedure_name)
            .ok_or_else(|| DispatchError::ProcedureNotFound(envelope.procedure_name.clone()))?;

        let ctx = InvocationContext::from_envelope(&envelope);
        let procedure = envelope.procedure_name;
        let executor = entry.executor();
        let coercer = self.coercer;
        let params = envelope.parameters;

        // Run on its own task so a panicking executor surfaces as a JoinError.
        let mut task =
            tokio::spawn(async move { executor.invoke(coercer, params, ctx).await });

        let joined = match self.execution_timeout {
            Some(budget) => match tokio::time::timeout(budget, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(DispatchError::Execution {
                        procedure,
                        reason: format!(
                            "execution exceeded {} ms",
                            budget.as_millis()
                        ),
                    });
                }
            },
            None => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => Err(DispatchError::Execution {
                procedure,
                reason: "executor panicked".to_string(),
            }),
            Err(_) => Err(DispatchError::Execution {
                procedure,
                reason: "execution was cancelled".to_string(),
            }),
        }
    }
}
