//! Picking a single service instance by name

use crate::error::RegistryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A resolved network endpoint, produced transiently by discovery lookups
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub host: String,
    pub port: u16,
    pub healthy: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// Create a healthy instance with no metadata
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            healthy: true,
            metadata: HashMap::new(),
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Selector lookup failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Unknown service: {0}")]
    UnknownService(String),
}

/// Chooses one healthy instance of a service
#[async_trait]
pub trait Selector: Send + Sync {
    /// `Ok(None)` when the service exists but has no healthy instance.
    async fn select_one(
        &self,
        service_name: &str,
    ) -> std::result::Result<Option<ServiceInstance>, SelectorError>;
}
