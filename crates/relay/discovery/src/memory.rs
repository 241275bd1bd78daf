//! In-memory discovery registry
//!
//! Suitable for development and testing. Service names are normalised with
//! the same rules the gateway uses for client types, so `CLIENT_1`,
//! `client-1` and `Client 1` all address one pool.

use crate::discovery::{InstanceId, ServiceDiscovery};
use crate::error::{DiscoveryError, DiscoveryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_types::service_name;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// A registered worker replica.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub instance_id: InstanceId,
    pub service: String,
    pub registered_at: DateTime<Utc>,
}

/// In-memory service registry
pub struct InMemoryDiscovery {
    services: DashMap<String, HashMap<InstanceId, InstanceRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryDiscovery {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Register a live replica of `service`.
    pub fn register(&self, service: &str, instance_id: InstanceId) -> DiscoveryResult<()> {
        let name = normalized(service)?;
        let mut instances = self.services.entry(name.clone()).or_default();

        if instances.contains_key(&instance_id) {
            return Err(DiscoveryError::InstanceAlreadyExists(instance_id));
        }

        info!(service = %name, instance_id = %instance_id, "Instance registered");
        instances.insert(
            instance_id.clone(),
            InstanceRecord {
                instance_id,
                service: name,
                registered_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Remove a replica. The service disappears with its last replica.
    pub fn deregister(&self, service: &str, instance_id: &InstanceId) -> DiscoveryResult<()> {
        let name = normalized(service)?;

        let removed = self
            .services
            .get_mut(&name)
            .and_then(|mut instances| instances.remove(instance_id));
        if removed.is_none() {
            return Err(DiscoveryError::InstanceNotFound(instance_id.clone()));
        }

        self.services.remove_if(&name, |_, instances| instances.is_empty());
        info!(service = %name, instance_id = %instance_id, "Instance deregistered");
        Ok(())
    }

    /// Registered replicas of `service`.
    pub fn instances(&self, service: &str) -> Vec<InstanceRecord> {
        self.services
            .get(&service_name(service))
            .map(|instances| instances.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Simulate a registry outage: every query fails until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> DiscoveryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Unavailable(
                "in-memory registry marked unavailable".into(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceDiscovery for InMemoryDiscovery {
    async fn has_instances(&self, service: &str) -> DiscoveryResult<bool> {
        self.check_available()?;
        let count = self
            .services
            .get(&service_name(service))
            .map(|instances| instances.len())
            .unwrap_or(0);
        debug!(service, count, "Presence check");
        Ok(count > 0)
    }

    async fn list_services(&self) -> DiscoveryResult<Vec<String>> {
        self.check_available()?;
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}

fn normalized(service: &str) -> DiscoveryResult<String> {
    let name = service_name(service);
    if name.is_empty() {
        return Err(DiscoveryError::InvalidServiceName(service.to_string()));
    }
    Ok(name)
}
