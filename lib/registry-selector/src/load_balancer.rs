//! Load balancing strategies for choosing among service instances

use registry_api::ServiceInstance;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Load balancing strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadBalancingStrategy {
    /// Round-robin: spread selections evenly across instances
    #[default]
    RoundRobin,
    /// Key hash: the same key keeps landing on the same instance
    KeyHash,
}

/// Load balancer for selecting healthy instances
pub struct LoadBalancer {
    strategy: LoadBalancingStrategy,
    round_robin_counter: AtomicUsize,
}

impl LoadBalancer {
    /// Create a new load balancer
    pub fn new(strategy: LoadBalancingStrategy) -> Self {
        Self {
            strategy,
            round_robin_counter: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> &LoadBalancingStrategy {
        &self.strategy
    }

    /// Select a healthy instance. `key` is only consulted by [`LoadBalancingStrategy::KeyHash`].
    pub fn select<'a>(
        &self,
        instances: &'a [ServiceInstance],
        key: Option<&str>,
    ) -> Option<&'a ServiceInstance> {
        let healthy: Vec<&'a ServiceInstance> = instances.iter().filter(|i| i.healthy).collect();
        if healthy.is_empty() {
            return None;
        }

        match (&self.strategy, key) {
            (LoadBalancingStrategy::KeyHash, Some(key)) => {
                healthy.get(Self::compute_hash(key) % healthy.len()).copied()
            }
            // Without a key there is nothing to hash
            _ => self.select_round_robin(&healthy),
        }
    }

    fn select_round_robin<'a>(
        &self,
        instances: &[&'a ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        let current = self.round_robin_counter.fetch_add(1, Ordering::SeqCst);
        instances.get(current % instances.len()).copied()
    }

    /// FNV-1a
    fn compute_hash(s: &str) -> usize {
        const FNV_OFFSET_BASIS: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET_BASIS;
        for byte in s.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash as usize
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(LoadBalancingStrategy::default())
    }
}
