//! Relay Discovery - presence checks for worker pools
//!
//! The gateway never needs instance addresses, only whether a logical worker
//! pool currently has at least one live replica. This crate provides:
//!
//! - **ServiceDiscovery**: the presence/liveness query trait
//! - **InMemoryDiscovery**: a registry suitable for development and testing
//! - **wait_until_populated**: start-up readiness wait on an empty registry
//!
//! Production deployments back [`ServiceDiscovery`] with a real service
//! registry (Eureka, Consul, Kubernetes endpoints, ...).

#![deny(unsafe_code)]

pub mod discovery;
pub mod error;
pub mod memory;
pub mod readiness;

pub use discovery::{InstanceId, ServiceDiscovery};
pub use error::{DiscoveryError, DiscoveryResult};
pub use memory::{InMemoryDiscovery, InstanceRecord};
pub use readiness::wait_until_populated;
