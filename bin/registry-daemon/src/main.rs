use anyhow::Result;
use registry_api::EventMeshUnRegisterInfo;
use registry_core::{ExtensionResolver, Registry};
use registry_selector::RegistrySelector;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod admin;
mod config;
mod metrics;
mod watcher;

use admin::AdminState;
use config::DaemonConfig;
use metrics::RegistryMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting registry-daemon...");

    let config = DaemonConfig::load()?;
    info!(
        "Node {} ({}) in cluster {} using plugin '{}'",
        config.node_name, config.endpoint, config.cluster_name, config.plugin_type
    );

    // Plugin table for this runtime
    let mut resolver = ExtensionResolver::new();
    registry_memory::install(&mut resolver);
    info!("Registry plugins available: {:?}", resolver.plugin_types());

    let registry = Arc::new(Registry::new(Arc::new(resolver)));
    start_registry(&registry, &config.plugin_type).await?;

    let node = config.register_info();
    if registry.register(node.clone()).await? {
        info!("Registered node {} in {}", node.name, node.cluster_name);
    }

    let metrics = RegistryMetrics::new()?;
    info!("Metrics collector initialized");

    tokio::spawn(watcher::run(
        registry.clone(),
        metrics.clone(),
        Duration::from_secs(5),
    ));

    let listener = TcpListener::bind(config.admin_addr).await?;
    info!("Admin server listening on {}", config.admin_addr);
    let state = Arc::new(AdminState {
        registry: registry.clone(),
        selector: RegistrySelector::new(registry.clone()),
        metrics,
        cluster_name: config.cluster_name.clone(),
    });
    tokio::spawn(admin::serve(listener, state));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting...");

    if let Err(e) = registry.un_register(EventMeshUnRegisterInfo::from(&node)).await {
        warn!("Failed to unregister node {}: {}", node.name, e);
    }
    registry.shutdown().await?;

    Ok(())
}

/// Initialize and start the registry. A failed start shuts the backends down again.
async fn start_registry(registry: &Registry, plugin_type: &str) -> Result<()> {
    registry.init(plugin_type).await?;
    if let Err(e) = registry.start().await {
        error!("Failed to start registry: {}", e);
        if let Err(e) = registry.shutdown().await {
            warn!("Registry shutdown after failed start: {}", e);
        }
        return Err(e.into());
    }
    Ok(())
}
