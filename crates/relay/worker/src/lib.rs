//! Relay Worker - turns envelopes into typed procedure invocations
//!
//! A worker pool hosts a fixed set of procedures:
//!
//! - **ProcedureRegistry**: immutable name -> executor table built at start-up
//! - **ParameterCoercer**: structural conversion of untyped parameters into a
//!   procedure's declared input type
//! - **ProcedureDispatcher**: lookup, coercion and execution of one envelope,
//!   always producing exactly one [`Response`](relay_types::Response)
//! - **ProcedureWorker**: broker consumer feeding the dispatcher with bounded
//!   concurrency and publishing replies to each envelope's `replyTo` topic
//!
//! Not-found, coercion and execution failures are business outcomes: they
//! become `success: false` responses, never consumer failures.

#![deny(unsafe_code)]

pub mod builtin;
pub mod coercion;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod procedure;
pub mod registry;
pub mod worker;

pub use coercion::{CoercionError, ParameterCoercer};
pub use config::WorkerConfig;
pub use dispatcher::ProcedureDispatcher;
pub use error::{DispatchError, RegistryError, RegistryResult, WorkerError, WorkerResult};
pub use procedure::{InputShape, InvocationContext, Procedure, ProcedureError};
pub use registry::{ProcedureDescriptor, ProcedureRegistry, ProcedureRegistryBuilder};
pub use worker::{ProcedureWorker, WorkerHandle};
