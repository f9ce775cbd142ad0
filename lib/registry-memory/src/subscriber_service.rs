//! In-memory subscriber store with a multiplexed change feed
//!
//! Every `watch()` call opens an independent delivery path; concurrent watchers each see
//! every transition from the moment they subscribed. Events are queued while the store's
//! write lock is held, so each watcher observes transitions of one id in mutation order.
//! The running check is made under the same lock, so nothing lands in the store once
//! `shutdown` has taken it.

use crate::lifecycle::ServiceLifecycle;
use async_trait::async_trait;
use registry_api::{
    RegistryError, RegistryEvent, Result, SubscriberInfo, SubscriberService, Watch, WatchSender,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Default)]
struct SubscriberTable {
    records: HashMap<String, SubscriberInfo>,
    watchers: Vec<WatchSender>,
}

impl SubscriberTable {
    fn emit(&mut self, event: RegistryEvent<SubscriberInfo>) {
        // Watchers whose receiving side is gone are detached here
        self.watchers.retain(|w| {
            let delivered = w.send_event(event.clone());
            if !delivered {
                debug!(watch = %w.id(), "Dropping closed watcher");
            }
            delivered
        });
    }
}

/// MemorySubscriberService tracks subscribers in process memory
pub struct MemorySubscriberService {
    lifecycle: ServiceLifecycle,
    table: RwLock<SubscriberTable>,
}

impl MemorySubscriberService {
    /// Create a new, uninitialized service
    pub fn new() -> Self {
        Self {
            lifecycle: ServiceLifecycle::new("MemorySubscriberService"),
            table: RwLock::new(SubscriberTable::default()),
        }
    }

    /// Number of live delivery paths
    pub async fn watcher_count(&self) -> usize {
        let mut table = self.table.write().await;
        table.watchers.retain(|w| !w.is_closed());
        table.watchers.len()
    }

    /// Simulate loss of the watch channel.
    ///
    /// Each live watcher receives one terminal error and is detached; callers must watch
    /// again to resume.
    pub async fn fail_watchers(&self, reason: &str) -> usize {
        let watchers: Vec<WatchSender> = self.table.write().await.watchers.drain(..).collect();
        let count = watchers.len();
        for watcher in watchers {
            warn!(watch = %watcher.id(), "Watch channel failed: {}", reason);
            watcher.fail(RegistryError::WatchClosed(reason.to_string()));
        }
        count
    }
}

impl Default for MemorySubscriberService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriberService for MemorySubscriberService {
    async fn init(&self) -> Result<()> {
        self.lifecycle.init()
    }

    async fn start(&self) -> Result<()> {
        self.lifecycle.start()
    }

    /// Stop the service and cancel every watch; queued events are discarded.
    async fn shutdown(&self) -> Result<()> {
        let mut table = self.table.write().await;
        self.lifecycle.shutdown()?;
        let closed = table.watchers.len();
        for watcher in table.watchers.drain(..) {
            watcher.cancel();
        }
        table.records.clear();
        debug!("Cancelled {} watcher(s) on shutdown", closed);
        Ok(())
    }

    /// Adds a new record. An id that is already present is left untouched and `false` is
    /// returned; use `update` to change it.
    async fn register(&self, info: SubscriberInfo) -> Result<bool> {
        let mut table = self.table.write().await;
        self.lifecycle.ensure_running("register")?;
        if table.records.contains_key(&info.id) {
            return Ok(false);
        }

        debug!("Registered subscriber {}", info.id);
        table.records.insert(info.id.clone(), info.clone());
        table.emit(RegistryEvent::added(info));
        Ok(true)
    }

    async fn un_register(&self, info: SubscriberInfo) -> Result<bool> {
        let mut table = self.table.write().await;
        self.lifecycle.ensure_running("un_register")?;
        let Some(removed) = table.records.remove(&info.id) else {
            return Ok(false);
        };

        debug!("Unregistered subscriber {}", removed.id);
        table.emit(RegistryEvent::removed(removed));
        Ok(true)
    }

    async fn update(&self, info: SubscriberInfo) -> Result<bool> {
        let mut table = self.table.write().await;
        self.lifecycle.ensure_running("update")?;
        let Some(existing) = table.records.get_mut(&info.id) else {
            return Err(RegistryError::SubscriberNotFound(info.id));
        };
        if *existing == info {
            return Ok(false);
        }

        *existing = info.clone();
        debug!("Updated subscriber {}", info.id);
        table.emit(RegistryEvent::updated(info));
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<SubscriberInfo>> {
        let table = self.table.read().await;
        self.lifecycle.ensure_running("get")?;
        Ok(table.records.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<SubscriberInfo>> {
        let table = self.table.read().await;
        self.lifecycle.ensure_running("list")?;
        Ok(table.records.values().cloned().collect())
    }

    async fn watch(&self) -> Result<Watch> {
        let mut table = self.table.write().await;
        self.lifecycle.ensure_running("watch")?;
        let (sender, watch) = Watch::channel();
        debug!(watch = %sender.id(), "Opened subscriber watch");
        table.watchers.push(sender);
        Ok(watch)
    }
}
