//! Long-lived subscriber watch
//!
//! The watch contract does not reconnect on its own: after an error item this loop opens a
//! new watch. It exits once the registry stops.

use crate::metrics::RegistryMetrics;
use futures::StreamExt;
use registry_api::{RegistryError, Watch, WatchNotification};
use registry_core::Registry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn run(registry: Arc<Registry>, metrics: RegistryMetrics, retry_delay: Duration) {
    loop {
        let watch = match registry.watch().await {
            Ok(watch) => watch,
            Err(RegistryError::NotRunning(_)) | Err(RegistryError::Lifecycle(_)) => {
                info!("Registry not running, subscriber watch exiting");
                return;
            }
            Err(e) => {
                warn!("Failed to open subscriber watch: {}", e);
                tokio::time::sleep(retry_delay).await;
                continue;
            }
        };

        info!(watch = %watch.id(), "Watching subscriber changes");
        if !drain(watch, &metrics).await {
            info!("Subscriber watch closed");
            return;
        }
        tokio::time::sleep(retry_delay).await;
    }
}

/// Consume one watch session. Returns `true` if it ended with an error and should be resumed.
async fn drain(mut watch: Watch, metrics: &RegistryMetrics) -> bool {
    while let Some(notification) = watch.next().await {
        match notification {
            WatchNotification::Event(event) => {
                info!(
                    kind = %event.kind,
                    id = %event.payload.id,
                    topics = ?event.payload.topics,
                    "Subscriber changed"
                );
                metrics.record_event(&event);
            }
            WatchNotification::Error(e) => {
                error!(watch = %watch.id(), "Subscriber watch failed: {}", e);
                metrics.watch_errors_total.inc();
                return true;
            }
        }
    }
    false
}
