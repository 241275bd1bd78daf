//! Procedure registry
//!
//! Built once at worker start-up and immutable afterwards, so lookups need no
//! locking. Each entry erases its procedure's concrete types behind
//! [`ErasedProcedure`], keeping the declared input shape alongside.

use crate::coercion::ParameterCoercer;
use crate::error::{DispatchError, RegistryError, RegistryResult};
use crate::procedure::{InputShape, InvocationContext, Procedure};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Type-erased executor: coerces, executes and serializes in one step.
#[async_trait]
pub(crate) trait ErasedProcedure: Send + Sync {
    async fn invoke(
        &self,
        coercer: ParameterCoercer,
        params: Value,
        ctx: InvocationContext,
    ) -> Result<Value, DispatchError>;
}

struct Typed<P: Procedure> {
    procedure: P,
    shape: InputShape,
}

#[async_trait]
impl<P: Procedure> ErasedProcedure for Typed<P> {
    async fn invoke(
        &self,
        coercer: ParameterCoercer,
        params: Value,
        ctx: InvocationContext,
    ) -> Result<Value, DispatchError> {
        let typed: P::Params = coercer.coerce(&ctx.procedure, self.shape, params)?;
        let procedure = ctx.procedure.clone();

        let output = self
            .procedure
            .execute(typed, ctx)
            .await
            .map_err(|e| DispatchError::Execution {
                procedure: procedure.clone(),
                reason: e.to_string(),
            })?;

        serde_json::to_value(output).map_err(|e| DispatchError::Execution {
            procedure,
            reason: format!("result could not be serialized: {e}"),
        })
    }
}

/// A registered procedure.
#[derive(Clone)]
pub struct ProcedureEntry {
    name: String,
    input_shape: InputShape,
    executor: Arc<dyn ErasedProcedure>,
}

impl ProcedureEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_shape(&self) -> InputShape {
        self.input_shape
    }

    pub(crate) fn executor(&self) -> Arc<dyn ErasedProcedure> {
        self.executor.clone()
    }
}

impl std::fmt::Debug for ProcedureEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureEntry")
            .field("name", &self.name)
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

/// Public description of a registered procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureDescriptor {
    pub name: String,
    pub input_shape: String,
}

/// Immutable name -> procedure table.
#[derive(Debug, Default)]
pub struct ProcedureRegistry {
    entries: HashMap<String, ProcedureEntry>,
}

impl ProcedureRegistry {
    pub fn builder() -> ProcedureRegistryBuilder {
        ProcedureRegistryBuilder::default()
    }

    /// Case-sensitive exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&ProcedureEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn descriptors(&self) -> Vec<ProcedureDescriptor> {
        let mut descriptors: Vec<ProcedureDescriptor> = self
            .entries
            .values()
            .map(|entry| ProcedureDescriptor {
                name: entry.name.clone(),
                input_shape: entry.input_shape.to_string(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }
}

/// Collects registrations; errors surface from [`build`](Self::build).
#[derive(Default)]
pub struct ProcedureRegistryBuilder {
    entries: HashMap<String, ProcedureEntry>,
    errors: Vec<RegistryError>,
}

impl ProcedureRegistryBuilder {
    pub fn register<P: Procedure>(mut self, name: impl Into<String>, procedure: P) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            self.errors.push(RegistryError::EmptyName);
            return self;
        }
        if self.entries.contains_key(&name) {
            self.errors.push(RegistryError::DuplicateProcedure(name));
            return self;
        }

        let shape = procedure.input_shape();
        debug!(procedure = %name, input_shape = %shape, "Procedure registered");
        self.entries.insert(
            name.clone(),
            ProcedureEntry {
                name,
                input_shape: shape,
                executor: Arc::new(Typed { procedure, shape }),
            },
        );
        self
    }

    pub fn build(mut self) -> RegistryResult<ProcedureRegistry> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        Ok(ProcedureRegistry {
            entries: self.entries,
        })
    }
}
