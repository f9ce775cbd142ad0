//! Prometheus metrics for the registry daemon

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use registry_api::{RegistryEvent, SubscriberInfo};
use std::sync::Arc;

/// Metrics collector; clones share the same underlying series
#[derive(Clone)]
pub struct RegistryMetrics {
    /// Subscriber change events seen on the watch, by kind
    pub watch_events_total: IntCounterVec,
    /// Watch sessions terminated by an error
    pub watch_errors_total: IntCounter,
    /// Subscribers in the registry as of the last scrape
    pub subscribers: IntGauge,
    /// Admin HTTP requests by path
    pub admin_requests_total: IntCounterVec,
    registry: Arc<Registry>,
}

impl RegistryMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let watch_events_total = IntCounterVec::new(
            Opts::new("registry_watch_events_total", "Subscriber change events received"),
            &["kind"],
        )?;
        let watch_errors_total = IntCounter::new(
            "registry_watch_errors_total",
            "Watch sessions terminated by an error",
        )?;
        let subscribers = IntGauge::new("registry_subscribers", "Known subscribers")?;
        let admin_requests_total = IntCounterVec::new(
            Opts::new("registry_admin_requests_total", "Admin HTTP requests"),
            &["path"],
        )?;

        registry.register(Box::new(watch_events_total.clone()))?;
        registry.register(Box::new(watch_errors_total.clone()))?;
        registry.register(Box::new(subscribers.clone()))?;
        registry.register(Box::new(admin_requests_total.clone()))?;

        Ok(Self {
            watch_events_total,
            watch_errors_total,
            subscribers,
            admin_requests_total,
            registry,
        })
    }

    pub fn record_event(&self, event: &RegistryEvent<SubscriberInfo>) {
        self.watch_events_total
            .with_label_values(&[event.kind.as_str()])
            .inc();
    }

    pub fn set_subscribers(&self, count: usize) {
        self.subscribers.set(count as i64);
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_event_counts_by_kind() {
        let metrics = RegistryMetrics::new().unwrap();
        let info = SubscriberInfo::new("s1", vec![]);
        metrics.record_event(&RegistryEvent::added(info.clone()));
        metrics.record_event(&RegistryEvent::updated(info.clone()));
        metrics.record_event(&RegistryEvent::updated(info));
        assert_eq!(
            metrics.watch_events_total.with_label_values(&["added"]).get(),
            1
        );
        assert_eq!(
            metrics.watch_events_total.with_label_values(&["updated"]).get(),
            2
        );
        metrics.set_subscribers(4);
        assert_eq!(metrics.subscribers.get(), 4);
    }

    #[test]
    fn test_gather_renders_text() {
        let metrics = RegistryMetrics::new().unwrap();
        metrics.watch_errors_total.inc();
        let text = metrics.gather().unwrap();
        assert!(text.contains("registry_watch_errors_total 1"));
    }
}
