//! Registry facade combining a RegistryService and a SubscriberService

use crate::extension::ExtensionResolver;
use crate::lifecycle::{LifecycleCell, LifecycleState};
use registry_api::{
    CapabilityKind, DistributionData, EventMeshDataInfo, EventMeshRegisterInfo,
    EventMeshUnRegisterInfo, RegistryError, RegistryEvent, RegistryService, Result,
    ShutdownFailure, SubscriberInfo, SubscriberService, Watch,
};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// Backend pair resolved for one plugin type
struct Services {
    plugin_type: String,
    registry: Arc<dyn RegistryService>,
    subscriber: Arc<dyn SubscriberService>,
}

/// Unified registry API for the runtime.
///
/// Both backend contracts are resolved from the same plugin type. Lifecycle calls
/// (`init`, `start`, `shutdown`) must be made once each, in order, by a single caller.
/// Every other method delegates 1:1 and returns the backend's result untouched.
pub struct Registry {
    resolver: Arc<ExtensionResolver>,
    state: LifecycleCell,
    services: OnceLock<Services>,
}

impl Registry {
    /// Create a new facade over `resolver`; nothing is resolved until `init`.
    pub fn new(resolver: Arc<ExtensionResolver>) -> Self {
        Self {
            resolver,
            state: LifecycleCell::new(),
            services: OnceLock::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Plugin type selected by `init`, if any
    pub fn plugin_type(&self) -> Option<&str> {
        self.services.get().map(|s| s.plugin_type.as_str())
    }

    /// Resolve both contracts for `plugin_type`, then initialize them.
    ///
    /// Resolution failure of either capability aborts before anything is initialized.
    pub async fn init(&self, plugin_type: &str) -> Result<()> {
        self.expect_state(LifecycleState::Uninitialized, "init")?;

        let registry = self
            .resolver
            .resolve_registry_service(plugin_type)
            .ok_or_else(|| not_found(CapabilityKind::RegistryService, plugin_type))?;
        let subscriber = self
            .resolver
            .resolve_subscriber_service(plugin_type)
            .ok_or_else(|| not_found(CapabilityKind::SubscriberService, plugin_type))?;

        let services = Services {
            plugin_type: plugin_type.to_string(),
            registry,
            subscriber,
        };
        if self.services.set(services).is_err() {
            return Err(RegistryError::Lifecycle(
                "registry plugins already resolved".to_string(),
            ));
        }
        let services = self.services()?;

        // Subscriber backends may rely on the node identity set up by the registry backend
        services.registry.init().await?;
        services.subscriber.init().await?;

        self.state.set(LifecycleState::Initialized);
        info!("Registry initialized with plugin type '{}'", plugin_type);
        Ok(())
    }

    /// Start both contracts, registry first.
    pub async fn start(&self) -> Result<()> {
        self.expect_state(LifecycleState::Initialized, "start")?;
        let services = self.services()?;

        services.registry.start().await?;
        services.subscriber.start().await?;

        self.state.set(LifecycleState::Started);
        info!("Registry started");
        Ok(())
    }

    /// Shut down both contracts, registry first.
    ///
    /// The subscriber shutdown is attempted even when the registry shutdown fails; all
    /// failures are returned together as [`RegistryError::Shutdown`].
    pub async fn shutdown(&self) -> Result<()> {
        if self.state() == LifecycleState::Stopped {
            return Err(RegistryError::Lifecycle(
                "shutdown called on a stopped registry".to_string(),
            ));
        }
        let services = self.services()?;

        let mut failures = Vec::new();
        if let Err(e) = services.registry.shutdown().await {
            error!("Registry service shutdown failed: {}", e);
            failures.push(ShutdownFailure {
                capability: CapabilityKind::RegistryService,
                error: Box::new(e),
            });
        }
        if let Err(e) = services.subscriber.shutdown().await {
            error!("Subscriber service shutdown failed: {}", e);
            failures.push(ShutdownFailure {
                capability: CapabilityKind::SubscriberService,
                error: Box::new(e),
            });
        }

        self.state.set(LifecycleState::Stopped);
        if failures.is_empty() {
            info!("Registry stopped");
            Ok(())
        } else {
            warn!("Registry stopped with {} shutdown failure(s)", failures.len());
            Err(RegistryError::Shutdown(failures))
        }
    }

    /// Mesh nodes registered in `cluster_name`
    pub async fn find_event_mesh_info_by_cluster(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<EventMeshDataInfo>> {
        self.services()?
            .registry
            .find_event_mesh_info_by_cluster(cluster_name)
            .await
    }

    /// Client counts per endpoint and purpose for `group`
    pub async fn find_event_mesh_client_distribution_data(
        &self,
        cluster_name: &str,
        group: &str,
        purpose: &str,
    ) -> Result<DistributionData> {
        self.services()?
            .registry
            .find_event_mesh_client_distribution_data(cluster_name, group, purpose)
            .await
    }

    /// Register a mesh node
    pub async fn register(&self, info: EventMeshRegisterInfo) -> Result<bool> {
        debug!("Registering node {} in {}", info.name, info.cluster_name);
        self.services()?.registry.register(info).await
    }

    /// Remove a mesh node
    pub async fn un_register(&self, info: EventMeshUnRegisterInfo) -> Result<bool> {
        debug!("Unregistering node {} from {}", info.name, info.cluster_name);
        self.services()?.registry.un_register(info).await
    }

    /// Add a subscriber; an existing id is left to the backend's semantics
    pub async fn register_subscriber(&self, info: SubscriberInfo) -> Result<bool> {
        self.services()?.subscriber.register(info).await
    }

    pub async fn un_register_subscriber(&self, info: SubscriberInfo) -> Result<bool> {
        self.services()?.subscriber.un_register(info).await
    }

    /// Replace an existing subscriber; fails if the id is unknown
    pub async fn update_subscriber(&self, info: SubscriberInfo) -> Result<bool> {
        self.services()?.subscriber.update(info).await
    }

    pub async fn get_subscriber(&self, id: &str) -> Result<Option<SubscriberInfo>> {
        self.services()?.subscriber.get(id).await
    }

    pub async fn list_subscribers(&self) -> Result<Vec<SubscriberInfo>> {
        self.services()?.subscriber.list().await
    }

    /// Open a change feed over all subscribers
    pub async fn watch(&self) -> Result<Watch> {
        self.services()?.subscriber.watch().await
    }

    /// Callback form of [`Registry::watch`]: handlers run on a spawned delivery task.
    pub async fn watch_with<E, R>(&self, on_event: E, on_error: R) -> Result<bool>
    where
        E: FnMut(RegistryEvent<SubscriberInfo>) + Send + 'static,
        R: FnOnce(RegistryError) + Send + 'static,
    {
        let watch = self.watch().await?;
        debug!(watch = %watch.id(), "Dispatching subscriber watch to handlers");
        watch.dispatch(on_event, on_error);
        Ok(true)
    }

    fn services(&self) -> Result<&Services> {
        self.services.get().ok_or_else(|| {
            RegistryError::Lifecycle("registry used before init".to_string())
        })
    }

    fn expect_state(&self, expected: LifecycleState, op: &str) -> Result<()> {
        let current = self.state();
        if current != expected {
            return Err(RegistryError::Lifecycle(format!(
                "{} requires state {}, registry is {}",
                op, expected, current
            )));
        }
        Ok(())
    }
}

fn not_found(capability: CapabilityKind, plugin_type: &str) -> RegistryError {
    error!("Can't load the {} plugin '{}', please check", capability, plugin_type);
    RegistryError::PluginNotFound {
        capability,
        plugin_type: plugin_type.to_string(),
    }
}
