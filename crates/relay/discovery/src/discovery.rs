//! Discovery trait and identifiers

use crate::error::DiscoveryResult;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a worker replica
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance:{}", self.0)
    }
}

/// Presence query against a service registry.
///
/// Implementations must answer from live registry state on every call;
/// worker pools may scale to zero between two calls.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Whether at least one live instance of `service` is registered.
    async fn has_instances(&self, service: &str) -> DiscoveryResult<bool>;

    /// Names of all services currently known to the registry.
    async fn list_services(&self) -> DiscoveryResult<Vec<String>>;
}
