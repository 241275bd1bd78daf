//! Relay Types - wire protocol for the procedure gateway
//!
//! This crate defines the messages exchanged between gateway instances and
//! worker pools over the broker:
//!
//! - **Envelope**: one call, published to a worker pool's request topic
//! - **Response**: one result, published to the issuing gateway's reply topic
//! - **Naming**: deterministic service/topic names derived from client types
//!
//! Both messages travel as JSON with camelCase field names. One broker
//! message carries exactly one Envelope or one Response.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod envelope;
pub mod error;
pub mod ids;
pub mod naming;
pub mod response;

pub use envelope::{Envelope, EnvelopeHeader, ExecutionMetadata, ProcedureCall};
pub use error::{WireError, WireResult};
pub use ids::RequestId;
pub use naming::{reply_topic, request_topic, service_name, DEFAULT_TOPIC_SUFFIX};
pub use response::{Outcome, Response};
