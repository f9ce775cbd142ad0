//! Registry-backed selector
//!
//! A service name is looked up as a mesh cluster name; each registered node becomes one
//! candidate instance.

use crate::health_check::HealthChecker;
use crate::load_balancer::LoadBalancer;
use async_trait::async_trait;
use registry_api::{EventMeshDataInfo, Selector, SelectorError, ServiceInstance};
use registry_core::Registry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Metadata key a backend may set to report node health
pub const HEALTHY_METADATA_KEY: &str = "healthy";

pub struct RegistrySelector {
    registry: Arc<Registry>,
    balancer: LoadBalancer,
    health_checker: Option<HealthChecker>,
}

impl RegistrySelector {
    /// Create a selector over a started registry, round-robin by default
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            balancer: LoadBalancer::default(),
            health_checker: None,
        }
    }

    /// Use a different balancing strategy
    pub fn with_balancer(mut self, balancer: LoadBalancer) -> Self {
        self.balancer = balancer;
        self
    }

    /// Probe candidates before every selection instead of trusting registry metadata
    pub fn with_health_checker(mut self, checker: HealthChecker) -> Self {
        self.health_checker = Some(checker);
        self
    }

    /// All instances currently registered for a service, healthy or not
    pub async fn instances(
        &self,
        service_name: &str,
    ) -> Result<Vec<ServiceInstance>, SelectorError> {
        let members = self
            .registry
            .find_event_mesh_info_by_cluster(service_name)
            .await?;
        let instances: Vec<ServiceInstance> = members.iter().filter_map(to_instance).collect();

        match &self.health_checker {
            Some(checker) => Ok(checker.refresh(instances).await),
            None => Ok(instances),
        }
    }

    /// Select with a sticky key; falls back to round-robin unless the balancer hashes keys
    pub async fn select_for_key(
        &self,
        service_name: &str,
        key: &str,
    ) -> Result<Option<ServiceInstance>, SelectorError> {
        self.select(service_name, Some(key)).await
    }

    async fn select(
        &self,
        service_name: &str,
        key: Option<&str>,
    ) -> Result<Option<ServiceInstance>, SelectorError> {
        let instances = self.instances(service_name).await?;
        if instances.is_empty() {
            return Err(SelectorError::UnknownService(service_name.to_string()));
        }

        let selected = self.balancer.select(&instances, key).cloned();
        match &selected {
            Some(instance) => debug!("Selected {} for {}", instance.address(), service_name),
            None => warn!("No healthy instance for {}", service_name),
        }
        Ok(selected)
    }
}

#[async_trait]
impl Selector for RegistrySelector {
    async fn select_one(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceInstance>, SelectorError> {
        self.select(service_name, None).await
    }
}

fn to_instance(info: &EventMeshDataInfo) -> Option<ServiceInstance> {
    let Some((host, port)) = info.endpoint.rsplit_once(':') else {
        warn!("Skipping node {} with endpoint '{}'", info.name, info.endpoint);
        return None;
    };
    let Ok(port) = port.parse::<u16>() else {
        warn!("Skipping node {} with endpoint '{}'", info.name, info.endpoint);
        return None;
    };

    let healthy = info
        .metadata
        .get(HEALTHY_METADATA_KEY)
        .map(|v| !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);

    Some(ServiceInstance {
        host: host.to_string(),
        port,
        healthy,
        metadata: info.metadata.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health_check::HealthCheckConfig;
    use crate::load_balancer::LoadBalancingStrategy;
    use registry_api::{EventMeshRegisterInfo, RegistryError};
    use registry_core::ExtensionResolver;
    use std::collections::HashMap;
    use std::time::Duration;

    async fn started_registry() -> Arc<Registry> {
        let mut resolver = ExtensionResolver::new();
        registry_memory::install(&mut resolver);
        let registry = Registry::new(Arc::new(resolver));
        registry.init(registry_memory::PLUGIN_TYPE).await.unwrap();
        registry.start().await.unwrap();
        Arc::new(registry)
    }

    async fn add_node(registry: &Registry, name: &str, endpoint: &str, healthy: Option<&str>) {
        let mut metadata = HashMap::new();
        if let Some(h) = healthy {
            metadata.insert(HEALTHY_METADATA_KEY.to_string(), h.to_string());
        }
        registry
            .register(EventMeshRegisterInfo {
                cluster_name: "orders".to_string(),
                name: name.to_string(),
                endpoint: endpoint.to_string(),
                protocol_type: "TCP".to_string(),
                metadata,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_select_one_round_robin_over_healthy() {
        let registry = started_registry().await;
        add_node(&registry, "mesh-a", "10.0.0.1:10000", None).await;
        add_node(&registry, "mesh-b", "10.0.0.2:10000", Some("false")).await;
        add_node(&registry, "mesh-c", "10.0.0.3:10000", Some("true")).await;

        let selector = RegistrySelector::new(registry);
        let first = selector.select_one("orders").await.unwrap().unwrap();
        let second = selector.select_one("orders").await.unwrap().unwrap();
        assert_eq!(first.host, "10.0.0.1");
        assert_eq!(second.host, "10.0.0.3");
        assert!(first.healthy && second.healthy);
    }

    #[tokio::test]
    async fn test_no_healthy_instance_is_none() {
        let registry = started_registry().await;
        add_node(&registry, "mesh-b", "10.0.0.2:10000", Some("false")).await;

        let selector = RegistrySelector::new(registry);
        assert!(selector.select_one("orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let registry = started_registry().await;
        let selector = RegistrySelector::new(registry);
        assert!(matches!(
            selector.select_one("payments").await,
            Err(SelectorError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_error_is_wrapped() {
        let registry = started_registry().await;
        registry.shutdown().await.unwrap();
        let selector = RegistrySelector::new(registry);
        assert!(matches!(
            selector.select_one("orders").await,
            Err(SelectorError::Registry(RegistryError::NotRunning(_)))
        ));
    }

    #[tokio::test]
    async fn test_bad_endpoints_are_skipped() {
        let registry = started_registry().await;
        add_node(&registry, "mesh-a", "no-port", None).await;
        add_node(&registry, "mesh-b", "10.0.0.2:http", None).await;
        add_node(&registry, "mesh-c", "10.0.0.3:10000", None).await;

        let selector = RegistrySelector::new(registry);
        let instances = selector.instances("orders").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].address(), "10.0.0.3:10000");
    }

    #[tokio::test]
    async fn test_key_hash_selection_is_sticky() {
        let registry = started_registry().await;
        add_node(&registry, "mesh-a", "10.0.0.1:10000", None).await;
        add_node(&registry, "mesh-b", "10.0.0.2:10000", None).await;

        let selector = RegistrySelector::new(registry)
            .with_balancer(LoadBalancer::new(LoadBalancingStrategy::KeyHash));
        let first = selector.select_for_key("orders", "client-7").await.unwrap();
        let again = selector.select_for_key("orders", "client-7").await.unwrap();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_health_checker_overrides_metadata() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let registry = started_registry().await;
        add_node(&registry, "mesh-a", &format!("127.0.0.1:{closed}"), None).await;
        add_node(&registry, "mesh-b", &format!("127.0.0.1:{open}"), Some("false")).await;

        let selector = RegistrySelector::new(registry).with_health_checker(HealthChecker::new(
            HealthCheckConfig {
                timeout: Duration::from_millis(500),
            },
        ));
        for _ in 0..3 {
            let picked = selector.select_one("orders").await.unwrap().unwrap();
            assert_eq!(picked.port, open);
        }
    }
}
