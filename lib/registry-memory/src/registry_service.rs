//! In-memory mesh node registry
//!
//! The running check is made under the node table lock, so a write racing `shutdown`
//! either completes before the table is cleared or fails with `NotRunning`.

use crate::lifecycle::ServiceLifecycle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use registry_api::{
    DistributionData, EventMeshDataInfo, EventMeshRegisterInfo, EventMeshUnRegisterInfo,
    RegistryService, Result,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Node identity: (cluster, name, endpoint)
type NodeKey = (String, String, String);

#[derive(Clone, Debug)]
struct NodeRecord {
    info: EventMeshRegisterInfo,
    last_update: DateTime<Utc>,
}

/// MemoryRegistryService keeps the cluster view in process memory
pub struct MemoryRegistryService {
    lifecycle: ServiceLifecycle,
    nodes: RwLock<HashMap<NodeKey, NodeRecord>>,
}

impl MemoryRegistryService {
    /// Create a new, uninitialized service
    pub fn new() -> Self {
        Self {
            lifecycle: ServiceLifecycle::new("MemoryRegistryService"),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Get count of registered nodes across all clusters
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }
}

impl Default for MemoryRegistryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryService for MemoryRegistryService {
    async fn init(&self) -> Result<()> {
        self.lifecycle.init()
    }

    async fn start(&self) -> Result<()> {
        self.lifecycle.start()
    }

    async fn shutdown(&self) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        self.lifecycle.shutdown()?;
        nodes.clear();
        Ok(())
    }

    /// Store or refresh a node. Returns `false` if an identical record is already present.
    async fn register(&self, info: EventMeshRegisterInfo) -> Result<bool> {
        let mut nodes = self.nodes.write().await;
        self.lifecycle.ensure_running("register")?;
        let key = (
            info.cluster_name.clone(),
            info.name.clone(),
            info.endpoint.clone(),
        );

        if nodes.get(&key).is_some_and(|existing| existing.info == info) {
            return Ok(false);
        }

        debug!("Registered node {}/{} at {}", key.0, key.1, key.2);
        nodes.insert(
            key,
            NodeRecord {
                info,
                last_update: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn un_register(&self, info: EventMeshUnRegisterInfo) -> Result<bool> {
        let mut nodes = self.nodes.write().await;
        self.lifecycle.ensure_running("un_register")?;
        let key = (info.cluster_name, info.name, info.endpoint);

        let removed = nodes.remove(&key).is_some();
        if removed {
            debug!("Deregistered node {}/{} at {}", key.0, key.1, key.2);
        }
        Ok(removed)
    }

    async fn find_event_mesh_info_by_cluster(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<EventMeshDataInfo>> {
        let nodes = self.nodes.read().await;
        self.lifecycle.ensure_running("find_event_mesh_info_by_cluster")?;

        let mut members: Vec<EventMeshDataInfo> = nodes
            .values()
            .filter(|record| record.info.cluster_name == cluster_name)
            .map(|record| EventMeshDataInfo {
                cluster_name: record.info.cluster_name.clone(),
                name: record.info.name.clone(),
                endpoint: record.info.endpoint.clone(),
                last_update_timestamp: record.last_update,
                metadata: record.info.metadata.clone(),
            })
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.endpoint.cmp(&b.endpoint)));
        Ok(members)
    }

    /// Endpoint -> (purpose -> count) for `group` in `cluster_name`.
    ///
    /// An empty `purpose` selects every purpose of the group. Nodes sharing an endpoint are
    /// summed; counts saturate at `u32::MAX`.
    async fn find_event_mesh_client_distribution_data(
        &self,
        cluster_name: &str,
        group: &str,
        purpose: &str,
    ) -> Result<DistributionData> {
        let nodes = self.nodes.read().await;
        self.lifecycle
            .ensure_running("find_event_mesh_client_distribution_data")?;

        let mut distribution = DistributionData::new();
        for record in nodes.values() {
            if record.info.cluster_name != cluster_name {
                continue;
            }
            let Some(purposes) = record.info.instance_num_map.get(group) else {
                continue;
            };

            let counts: HashMap<String, u32> = purposes
                .iter()
                .filter(|(p, _)| purpose.is_empty() || p.as_str() == purpose)
                .map(|(p, n)| (p.clone(), *n))
                .collect();
            if counts.is_empty() {
                continue;
            }

            let entry = distribution
                .entry(record.info.endpoint.clone())
                .or_default();
            for (p, n) in counts {
                let count = entry.entry(p).or_insert(0);
                *count = count.saturating_add(n);
            }
        }
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_api::RegistryError;
    use std::sync::Arc;

    async fn running() -> MemoryRegistryService {
        let svc = MemoryRegistryService::new();
        svc.init().await.unwrap();
        svc.start().await.unwrap();
        svc
    }

    fn node(name: &str, endpoint: &str) -> EventMeshRegisterInfo {
        EventMeshRegisterInfo {
            cluster_name: "DefaultCluster".to_string(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            protocol_type: "TCP".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_reports_state_change() {
        let svc = running().await;
        let info = node("mesh-a", "10.0.0.1:10000");

        assert!(svc.register(info.clone()).await.unwrap());
        assert!(!svc.register(info.clone()).await.unwrap());

        let mut changed = info.clone();
        changed.metadata.insert("zone".to_string(), "az1".to_string());
        assert!(svc.register(changed).await.unwrap());
        assert_eq!(svc.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_un_register() {
        let svc = running().await;
        let info = node("mesh-a", "10.0.0.1:10000");
        svc.register(info.clone()).await.unwrap();

        let un = EventMeshUnRegisterInfo::from(&info);
        assert!(svc.un_register(un.clone()).await.unwrap());
        assert!(!svc.un_register(un).await.unwrap());
        assert_eq!(svc.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_find_by_cluster() {
        let svc = running().await;
        svc.register(node("mesh-b", "10.0.0.2:10000")).await.unwrap();
        svc.register(node("mesh-a", "10.0.0.1:10000")).await.unwrap();
        let mut other = node("mesh-c", "10.0.1.1:10000");
        other.cluster_name = "OtherCluster".to_string();
        svc.register(other).await.unwrap();

        let members = svc
            .find_event_mesh_info_by_cluster("DefaultCluster")
            .await
            .unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["mesh-a", "mesh-b"]);
        assert!(svc
            .find_event_mesh_info_by_cluster("Nowhere")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_distribution_data() {
        let svc = running().await;
        let mut a = node("mesh-a", "10.0.0.1:10000");
        a.instance_num_map.insert(
            "orders-group".to_string(),
            HashMap::from([("pub".to_string(), 3), ("sub".to_string(), 5)]),
        );
        let mut b = node("mesh-b", "10.0.0.2:10000");
        b.instance_num_map.insert(
            "orders-group".to_string(),
            HashMap::from([("pub".to_string(), 1)]),
        );
        svc.register(a).await.unwrap();
        svc.register(b).await.unwrap();

        let all = svc
            .find_event_mesh_client_distribution_data("DefaultCluster", "orders-group", "")
            .await
            .unwrap();
        assert_eq!(all["10.0.0.1:10000"]["sub"], 5);
        assert_eq!(all["10.0.0.2:10000"]["pub"], 1);

        let subs = svc
            .find_event_mesh_client_distribution_data("DefaultCluster", "orders-group", "sub")
            .await
            .unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs["10.0.0.1:10000"], HashMap::from([("sub".to_string(), 5)]));

        assert!(svc
            .find_event_mesh_client_distribution_data("DefaultCluster", "other", "")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_operations_require_start() {
        let svc = MemoryRegistryService::new();
        svc.init().await.unwrap();
        assert!(matches!(
            svc.register(node("mesh-a", "10.0.0.1:10000")).await,
            Err(RegistryError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_distribution_sums_shared_endpoint_without_overflow() {
        let svc = running().await;
        for name in ["mesh-a", "mesh-b"] {
            let mut info = node(name, "10.0.0.1:10000");
            info.instance_num_map.insert(
                "orders-group".to_string(),
                HashMap::from([("sub".to_string(), u32::MAX), ("pub".to_string(), 2)]),
            );
            svc.register(info).await.unwrap();
        }

        let data = svc
            .find_event_mesh_client_distribution_data("DefaultCluster", "orders-group", "")
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["10.0.0.1:10000"]["sub"], u32::MAX);
        assert_eq!(data["10.0.0.1:10000"]["pub"], 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_register_racing_shutdown_leaves_table_empty() {
        let svc = Arc::new(running().await);

        let writers: Vec<_> = (0..64)
            .map(|i| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.register(node(&format!("mesh-{i}"), "10.0.0.1:10000")).await
                })
            })
            .collect();
        svc.shutdown().await.unwrap();

        for writer in writers {
            match writer.await.unwrap() {
                Ok(_) | Err(RegistryError::NotRunning(_)) => {}
                Err(e) => panic!("unexpected {e:?}"),
            }
        }
        assert_eq!(svc.node_count().await, 0);
    }
}
