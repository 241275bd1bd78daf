//! Relay broker boundary primitives.
//!
//! Broker adapters are responsible only for delivery mechanics: topics,
//! consumer groups and opaque byte payloads. They know nothing about
//! envelopes, correlation or procedures.
//!
//! The crate ships an [`InMemoryBroker`] used for development, tests and the
//! single-process daemon. Production deployments implement [`MessageBroker`]
//! on top of a real broker client.

#![deny(unsafe_code)]

pub mod broker;
pub mod error;
pub mod memory;

pub use broker::{BrokerMessage, MessageBroker, PublishReceipt, Subscription};
pub use error::{BrokerError, BrokerResult};
pub use memory::InMemoryBroker;
