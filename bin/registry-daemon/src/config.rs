//! Daemon configuration: YAML file plus environment overrides

use anyhow::{Context, Result};
use registry_api::EventMeshRegisterInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

pub const CONFIG_PATH_ENV: &str = "EVENTMESH_REGISTRY_CONFIG";
pub const PLUGIN_ENV: &str = "EVENTMESH_REGISTRY_PLUGIN";
pub const CLUSTER_ENV: &str = "EVENTMESH_CLUSTER";
pub const ADMIN_ADDR_ENV: &str = "EVENTMESH_ADMIN_ADDR";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Backend plugin type resolved for both registry capabilities
    pub plugin_type: String,
    pub cluster_name: String,
    pub node_name: String,
    /// Endpoint this node advertises, `host:port`
    pub endpoint: String,
    pub protocol_type: String,
    pub admin_addr: SocketAddr,
    pub metadata: HashMap<String, String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            plugin_type: "memory".to_string(),
            cluster_name: "DefaultCluster".to_string(),
            node_name: "eventmesh-node".to_string(),
            endpoint: "127.0.0.1:10000".to_string(),
            protocol_type: "TCP".to_string(),
            admin_addr: ([0, 0, 0, 0], 10106).into(),
            metadata: HashMap::new(),
        }
    }
}

impl DaemonConfig {
    /// Load from the file named by `EVENTMESH_REGISTRY_CONFIG` (defaults if unset), then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => {
                info!("{} not set, using default configuration", CONFIG_PATH_ENV);
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(plugin_type) = lookup(PLUGIN_ENV) {
            self.plugin_type = plugin_type;
        }
        if let Some(cluster) = lookup(CLUSTER_ENV) {
            self.cluster_name = cluster;
        }
        if let Some(addr) = lookup(ADMIN_ADDR_ENV) {
            self.admin_addr = addr
                .parse()
                .with_context(|| format!("Invalid {}: {}", ADMIN_ADDR_ENV, addr))?;
        }
        Ok(())
    }

    /// Registration record for this node
    pub fn register_info(&self) -> EventMeshRegisterInfo {
        EventMeshRegisterInfo {
            cluster_name: self.cluster_name.clone(),
            name: self.node_name.clone(),
            endpoint: self.endpoint.clone(),
            protocol_type: self.protocol_type.clone(),
            instance_num_map: HashMap::new(),
            metadata: self.metadata.clone(),
        }
    }
}
