//! In-process registry backend
//!
//! Implements both registry contracts without any external system. Useful for single-node
//! deployments and as the reference behavior other backends are measured against.

mod lifecycle;
pub mod registry_service;
pub mod subscriber_service;

pub use registry_service::MemoryRegistryService;
pub use subscriber_service::MemorySubscriberService;

use registry_api::{RegistryService, SubscriberService};
use registry_core::ExtensionResolver;
use std::sync::Arc;

/// Plugin type name under which this backend is installed
pub const PLUGIN_TYPE: &str = "memory";

/// Add the in-memory backend to a resolver's factory table.
pub fn install(resolver: &mut ExtensionResolver) {
    resolver.register_registry_service(PLUGIN_TYPE, || {
        Arc::new(MemoryRegistryService::new()) as Arc<dyn RegistryService>
    });
    resolver.register_subscriber_service(PLUGIN_TYPE, || {
        Arc::new(MemorySubscriberService::new()) as Arc<dyn SubscriberService>
    });
}
