//! EventMesh registry contracts
//!
//! This library defines what every registry backend must provide:
//! - RegistryService: mesh node registration and cluster membership queries
//! - SubscriberService: subscriber CRUD plus a live change feed
//! - Data types exchanged with backends (register info, subscriber records, events)
//! - Selector: picking one healthy service instance by name

pub mod error;
pub mod selector;
pub mod service;
pub mod types;
pub mod watch;

pub use error::{RegistryError, Result, ShutdownFailure};
pub use selector::{Selector, SelectorError, ServiceInstance};
pub use service::{CapabilityKind, RegistryService, SubscriberService};
pub use types::{
    ChangeKind, DistributionData, EventMeshDataInfo, EventMeshRegisterInfo,
    EventMeshUnRegisterInfo, RegistryEvent, SubscriberInfo,
};
pub use watch::{Watch, WatchNotification, WatchSender};
