//! Client type -> request topic resolution

use crate::error::{GatewayError, GatewayResult};
use relay_discovery::ServiceDiscovery;
use relay_types::{request_topic, service_name};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves a logical client type to the topic its workers consume.
///
/// Liveness is checked against discovery on every call; nothing is cached,
/// so pools scaled to zero are noticed immediately.
#[derive(Clone)]
pub struct TopicResolver {
    discovery: Arc<dyn ServiceDiscovery>,
    topic_suffix: String,
}

impl TopicResolver {
    pub fn new(discovery: Arc<dyn ServiceDiscovery>, topic_suffix: impl Into<String>) -> Self {
        Self {
            discovery,
            topic_suffix: topic_suffix.into(),
        }
    }

    pub async fn resolve(&self, client_type: &str) -> GatewayResult<String> {
        let service = service_name(client_type);
        if service.is_empty() {
            return Err(GatewayError::InvalidRequest(format!(
                "client type '{client_type}' does not name a service"
            )));
        }

        let live = match self.discovery.has_instances(&service).await {
            Ok(live) => live,
            Err(e) => {
                warn!(service = %service, error = %e, "Discovery lookup failed");
                false
            }
        };

        if !live {
            let known_services = match self.discovery.list_services().await {
                Ok(services) => services,
                Err(e) => {
                    warn!(error = %e, "Could not list known services");
                    Vec::new()
                }
            };
            warn!(service = %service, ?known_services, "No live instances");
            return Err(GatewayError::ServiceNotFound {
                service,
                known_services,
            });
        }

        let topic = request_topic(client_type, &self.topic_suffix);
        debug!(client_type, topic = %topic, "Resolved request topic");
        Ok(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_discovery::{InMemoryDiscovery, InstanceId};

    fn resolver() -> (Arc<InMemoryDiscovery>, TopicResolver) {
        let discovery = Arc::new(InMemoryDiscovery::new());
        let resolver = TopicResolver::new(discovery.clone(), "-procedures");
        (discovery, resolver)
    }

    #[tokio::test]
    async fn test_resolves_live_service() {
        let (discovery, resolver) = resolver();
        discovery.register("client-1", InstanceId::generate()).unwrap();

        assert_eq!(resolver.resolve("CLIENT_1").await.unwrap(), "client-1-procedures");
    }

    #[tokio::test]
    async fn test_unknown_service_lists_known() {
        let (discovery, resolver) = resolver();
        discovery.register("client-1", InstanceId::generate()).unwrap();

        match resolver.resolve("client-2").await {
            Err(GatewayError::ServiceNotFound {
                service,
                known_services,
            }) => {
                assert_eq!(service, "client-2");
                assert_eq!(known_services, vec!["client-1"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_caching_after_scale_to_zero() {
        let (discovery, resolver) = resolver();
        let id = InstanceId::generate();
        discovery.register("svc", id.clone()).unwrap();
        assert!(resolver.resolve("svc").await.is_ok());

        discovery.deregister("svc", &id).unwrap();
        assert!(matches!(
            resolver.resolve("svc").await,
            Err(GatewayError::ServiceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_discovery_outage_is_not_found() {
        let (discovery, resolver) = resolver();
        discovery.register("svc", InstanceId::generate()).unwrap();
        discovery.set_unavailable(true);

        match resolver.resolve("svc").await {
            Err(GatewayError::ServiceNotFound { known_services, .. }) => {
                assert!(known_services.is_empty())
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_client_type_is_invalid() {
        let (_, resolver) = resolver();
        assert!(matches!(
            resolver.resolve(" -- ").await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
