//! Relay Gateway - request-reply over publish/subscribe
//!
//! The gateway turns a one-way publish into a correlated call:
//!
//! 1. [`TopicResolver`] maps the caller's client type to a request topic after
//!    confirming the pool has live replicas.
//! 2. [`PendingRequestTable`] registers a completion handle for the request id.
//! 3. [`ProcedureRouter`] publishes the envelope with `replyTo` set to this
//!    instance's private reply topic.
//! 4. [`ReplyListener`] consumes that topic and completes matching handles.
//!
//! Each call reaches exactly one terminal state: resolved, timed out, publish
//! failed or interrupted. Whichever happens first removes the pending entry;
//! the rest are no-ops.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod listener;
pub mod pending;
pub mod resolver;
pub mod router;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use listener::ReplyListener;
pub use pending::{PendingHandle, PendingRequestTable, PendingStats};
pub use resolver::TopicResolver;
pub use router::{ProcedureRouter, ResponseFuture};
