//! Built-in demonstration procedures
//!
//! `echo`, `calculateSum` and `healthCheck`, hosted by the daemon's embedded
//! pools and used throughout the integration tests.

use crate::error::{RegistryError, RegistryResult};
use crate::procedure::{InvocationContext, Procedure, ProcedureError};
use crate::registry::ProcedureRegistryBuilder;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

pub const ECHO: &str = "echo";
pub const CALCULATE_SUM: &str = "calculateSum";
pub const HEALTH_CHECK: &str = "healthCheck";

/// Names accepted by [`register_builtin`].
pub const BUILTIN_PROCEDURES: [&str; 3] = [ECHO, CALCULATE_SUM, HEALTH_CHECK];

/// Returns its parameters unchanged.
pub struct EchoProcedure;

#[async_trait]
impl Procedure for EchoProcedure {
    type Params = Value;
    type Output = Value;

    async fn execute(&self, params: Value, _ctx: InvocationContext) -> Result<Value, ProcedureError> {
        Ok(params)
    }
}

#[derive(Debug, Deserialize)]
pub struct SumParams {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SumResult {
    pub sum: f64,
    pub operation: &'static str,
}

pub struct CalculateSumProcedure;

#[async_trait]
impl Procedure for CalculateSumProcedure {
    type Params = SumParams;
    type Output = SumResult;

    async fn execute(
        &self,
        params: SumParams,
        _ctx: InvocationContext,
    ) -> Result<SumResult, ProcedureError> {
        let sum = params.a + params.b;
        if !sum.is_finite() {
            return Err(ProcedureError::InvalidInput(format!(
                "sum of {} and {} is not finite",
                params.a, params.b
            )));
        }
        Ok(SumResult {
            sum,
            operation: "addition",
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub service: String,
    pub timestamp: i64,
    pub uptime_ms: u64,
}

/// Reports the hosting pool as up.
pub struct HealthCheckProcedure {
    service: String,
    started: Instant,
}

impl HealthCheckProcedure {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            started: Instant::now(),
        }
    }
}

#[async_trait]
impl Procedure for HealthCheckProcedure {
    type Params = NoParams;
    type Output = HealthReport;

    async fn execute(
        &self,
        _params: NoParams,
        _ctx: InvocationContext,
    ) -> Result<HealthReport, ProcedureError> {
        Ok(HealthReport {
            status: "OK",
            service: self.service.clone(),
            timestamp: Utc::now().timestamp_millis(),
            uptime_ms: self.started.elapsed().as_millis() as u64,
        })
    }
}

/// Add the built-in procedure `name` to `builder`.
pub fn register_builtin(
    builder: ProcedureRegistryBuilder,
    name: &str,
    service: &str,
) -> RegistryResult<ProcedureRegistryBuilder> {
    match name {
        ECHO => Ok(builder.register(ECHO, EchoProcedure)),
        CALCULATE_SUM => Ok(builder.register(CALCULATE_SUM, CalculateSumProcedure)),
        HEALTH_CHECK => Ok(builder.register(HEALTH_CHECK, HealthCheckProcedure::new(service))),
        other => Err(RegistryError::UnknownBuiltin(other.to_string())),
    }
}
