//! Backend-agnostic registry contracts
//!
//! Lifecycle (`init`, `start`, `shutdown`) is caller-serialized: each is called at most
//! once, in that order. Repeating a call without an intervening shutdown is a precondition
//! violation and backends may fail it. All other operations may be called concurrently once
//! the service is started; each is atomic per key but no cross-call transactions exist.

use crate::error::Result;
use crate::types::{
    DistributionData, EventMeshDataInfo, EventMeshRegisterInfo, EventMeshUnRegisterInfo,
    SubscriberInfo,
};
use crate::watch::Watch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capability a plugin type can provide
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    RegistryService,
    SubscriberService,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::RegistryService => f.write_str("registry-service"),
            CapabilityKind::SubscriberService => f.write_str("subscriber-service"),
        }
    }
}

/// Mesh node registration and cluster membership
#[async_trait]
pub trait RegistryService: Send + Sync {
    async fn init(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;

    /// Register a node. Returns whether the registry state changed.
    ///
    /// Never partially applies: on `Err` the node's presence is unchanged.
    async fn register(&self, info: EventMeshRegisterInfo) -> Result<bool>;

    /// Remove a node. Returns whether the registry state changed.
    async fn un_register(&self, info: EventMeshUnRegisterInfo) -> Result<bool>;

    async fn find_event_mesh_info_by_cluster(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<EventMeshDataInfo>>;

    async fn find_event_mesh_client_distribution_data(
        &self,
        cluster_name: &str,
        group: &str,
        purpose: &str,
    ) -> Result<DistributionData>;
}

/// Subscriber records plus their change feed
#[async_trait]
pub trait SubscriberService: Send + Sync {
    async fn init(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    /// Stops the service. Every open [`Watch`] ends and receives nothing further.
    async fn shutdown(&self) -> Result<()>;

    async fn register(&self, info: SubscriberInfo) -> Result<bool>;

    async fn un_register(&self, info: SubscriberInfo) -> Result<bool>;

    /// Replace an existing record. Fails with `SubscriberNotFound` if the id is unknown.
    async fn update(&self, info: SubscriberInfo) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<SubscriberInfo>>;

    /// Snapshot of all records; order is not significant.
    async fn list(&self) -> Result<Vec<SubscriberInfo>>;

    /// Open a delivery path for subscriber changes.
    ///
    /// Each distinct state transition of a given id is delivered exactly once, in mutation
    /// order. An error item terminates the watch; callers re-watch to resume. Whether a
    /// second call multiplexes or replaces the first is backend-defined and must be
    /// documented by the implementation.
    async fn watch(&self) -> Result<Watch>;
}
