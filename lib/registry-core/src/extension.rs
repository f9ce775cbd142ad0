//! Plugin-type name to backend implementation lookup

use registry_api::{RegistryService, SubscriberService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type RegistryServiceFactory = Box<dyn Fn() -> Arc<dyn RegistryService> + Send + Sync>;
pub type SubscriberServiceFactory = Box<dyn Fn() -> Arc<dyn SubscriberService> + Send + Sync>;

/// Named factory table owned by the runtime's composition root.
///
/// Each capability+name pair resolves to one shared instance: the factory runs on first
/// resolution and the result is cached.
pub struct ExtensionResolver {
    registry_factories: HashMap<String, RegistryServiceFactory>,
    subscriber_factories: HashMap<String, SubscriberServiceFactory>,
    registry_instances: Mutex<HashMap<String, Arc<dyn RegistryService>>>,
    subscriber_instances: Mutex<HashMap<String, Arc<dyn SubscriberService>>>,
}

impl ExtensionResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self {
            registry_factories: HashMap::new(),
            subscriber_factories: HashMap::new(),
            registry_instances: Mutex::new(HashMap::new()),
            subscriber_instances: Mutex::new(HashMap::new()),
        }
    }

    /// Register the RegistryService factory for `plugin_type`, replacing any previous one
    pub fn register_registry_service<F>(&mut self, plugin_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn RegistryService> + Send + Sync + 'static,
    {
        let plugin_type = plugin_type.into();
        debug!("Registered registry-service factory: {}", plugin_type);
        self.registry_factories.insert(plugin_type, Box::new(factory));
    }

    /// Register the SubscriberService factory for `plugin_type`, replacing any previous one
    pub fn register_subscriber_service<F>(&mut self, plugin_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn SubscriberService> + Send + Sync + 'static,
    {
        let plugin_type = plugin_type.into();
        debug!("Registered subscriber-service factory: {}", plugin_type);
        self.subscriber_factories.insert(plugin_type, Box::new(factory));
    }

    /// Shared RegistryService instance for `plugin_type`, or `None` if not registered
    pub fn resolve_registry_service(&self, plugin_type: &str) -> Option<Arc<dyn RegistryService>> {
        resolve(&self.registry_factories, &self.registry_instances, plugin_type)
    }

    /// Shared SubscriberService instance for `plugin_type`, or `None` if not registered
    pub fn resolve_subscriber_service(
        &self,
        plugin_type: &str,
    ) -> Option<Arc<dyn SubscriberService>> {
        resolve(&self.subscriber_factories, &self.subscriber_instances, plugin_type)
    }

    /// Plugin types that provide both capabilities
    pub fn plugin_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .registry_factories
            .keys()
            .filter(|name| self.subscriber_factories.contains_key(*name))
            .cloned()
            .collect();
        types.sort();
        types
    }
}

impl Default for ExtensionResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve<T: ?Sized>(
    factories: &HashMap<String, Box<dyn Fn() -> Arc<T> + Send + Sync>>,
    instances: &Mutex<HashMap<String, Arc<T>>>,
    plugin_type: &str,
) -> Option<Arc<T>> {
    let factory = factories.get(plugin_type)?;
    // A poisoned cache still holds valid Arcs
    let mut instances = instances.lock().unwrap_or_else(|e| e.into_inner());
    let instance = instances
        .entry(plugin_type.to_string())
        .or_insert_with(|| {
            debug!("Instantiating plugin: {}", plugin_type);
            factory()
        })
        .clone();
    Some(instance)
}
