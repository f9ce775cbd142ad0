//! Service instance selection on top of the registry
pub mod health_check;
pub mod load_balancer;
pub mod selector;

pub use health_check::{HealthCheckConfig, HealthChecker};
pub use load_balancer::{LoadBalancer, LoadBalancingStrategy};
pub use selector::RegistrySelector;
