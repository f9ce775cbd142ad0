//! TCP health probing for service instances

use registry_api::ServiceInstance;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

/// Health check configuration
#[derive(Clone, Debug)]
pub struct HealthCheckConfig {
    /// Timeout for a single connect attempt
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
        }
    }
}

/// Probes instances by opening a TCP connection to them
pub struct HealthChecker {
    config: HealthCheckConfig,
}

impl HealthChecker {
    /// Create a new health checker
    pub fn new(config: HealthCheckConfig) -> Self {
        Self { config }
    }

    /// Check if an instance accepts TCP connections within the timeout
    pub async fn check_instance(&self, instance: &ServiceInstance) -> bool {
        let address = instance.address();
        match time::timeout(self.config.timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => {
                debug!("Instance {} is healthy", address);
                true
            }
            Ok(Err(e)) => {
                warn!("Instance {} health check error: {}", address, e);
                false
            }
            Err(_) => {
                warn!("Instance {} health check timeout", address);
                false
            }
        }
    }

    /// Probe every instance and rewrite its `healthy` flag
    pub async fn refresh(&self, mut instances: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
        for instance in instances.iter_mut() {
            instance.healthy = self.check_instance(instance).await;
        }
        instances
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthCheckConfig::default())
    }
}
