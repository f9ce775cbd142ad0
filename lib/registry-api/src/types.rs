//! Records exchanged between the runtime and registry backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client distribution per node: endpoint -> (purpose -> client count)
pub type DistributionData = HashMap<String, HashMap<String, u32>>;

/// Request to add a mesh node to the cluster view
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMeshRegisterInfo {
    pub cluster_name: String,
    pub name: String,
    /// `host:port` the node serves on
    pub endpoint: String,
    pub protocol_type: String,
    /// Connected clients: group -> (purpose -> count)
    #[serde(default)]
    pub instance_num_map: HashMap<String, HashMap<String, u32>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Request to remove a mesh node from the cluster view
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMeshUnRegisterInfo {
    pub cluster_name: String,
    pub name: String,
    pub endpoint: String,
    pub protocol_type: String,
}

impl From<&EventMeshRegisterInfo> for EventMeshUnRegisterInfo {
    fn from(info: &EventMeshRegisterInfo) -> Self {
        Self {
            cluster_name: info.cluster_name.clone(),
            name: info.name.clone(),
            endpoint: info.endpoint.clone(),
            protocol_type: info.protocol_type.clone(),
        }
    }
}

/// Read-only snapshot of a discoverable cluster member
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMeshDataInfo {
    pub cluster_name: String,
    pub name: String,
    pub endpoint: String,
    pub last_update_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A consumer's registration record, keyed by `id`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriberInfo {
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SubscriberInfo {
    /// Create a subscriber with no endpoint or metadata
    pub fn new(id: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            id: id.into(),
            topics,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
            ChangeKind::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single state transition observed by a backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryEvent<T> {
    pub kind: ChangeKind,
    pub payload: T,
}

impl<T> RegistryEvent<T> {
    pub fn added(payload: T) -> Self {
        Self { kind: ChangeKind::Added, payload }
    }

    pub fn updated(payload: T) -> Self {
        Self { kind: ChangeKind::Updated, payload }
    }

    pub fn removed(payload: T) -> Self {
        Self { kind: ChangeKind::Removed, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregister_info_from_register_info() {
        let info = EventMeshRegisterInfo {
            cluster_name: "DefaultCluster".to_string(),
            name: "mesh-a".to_string(),
            endpoint: "10.0.0.1:10000".to_string(),
            protocol_type: "TCP".to_string(),
            ..Default::default()
        };
        let un = EventMeshUnRegisterInfo::from(&info);
        assert_eq!(un.cluster_name, "DefaultCluster");
        assert_eq!(un.name, "mesh-a");
        assert_eq!(un.endpoint, "10.0.0.1:10000");
        assert_eq!(un.protocol_type, "TCP");
    }

    #[test]
    fn test_subscriber_info_deserialize_defaults() {
        let info: SubscriberInfo =
            serde_json::from_str(r#"{"id":"s1","endpoint":"10.0.0.9:8080"}"#).unwrap();
        assert_eq!(info.id, "s1");
        assert!(info.topics.is_empty());
        assert!(info.metadata.is_empty());
    }

    #[test]
    fn test_change_kind_serializes_lowercase() {
        let event = RegistryEvent::removed(SubscriberInfo::new("s1", vec![]));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "removed");
        assert_eq!(ChangeKind::Updated.to_string(), "updated");
    }
}
