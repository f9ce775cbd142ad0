//! Subscriber change feed
//!
//! A [`Watch`] is the receiving half of one delivery path. Backends keep the matching
//! [`WatchSender`] and push a [`WatchNotification`] for every state transition. The feed
//! ends after a terminal error item, when the backend drops the sender, or as soon as the
//! backend cancels it on shutdown. Cancellation discards anything still queued.

use crate::error::RegistryError;
use crate::types::{RegistryEvent, SubscriberInfo};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// One emission on a watch: either a change or a terminal failure
#[derive(Clone, Debug, PartialEq)]
pub enum WatchNotification {
    Event(RegistryEvent<SubscriberInfo>),
    Error(RegistryError),
}

/// Backend side of a watch
#[derive(Debug)]
pub struct WatchSender {
    id: Uuid,
    tx: mpsc::UnboundedSender<WatchNotification>,
    cancelled: Arc<AtomicBool>,
}

impl WatchSender {
    /// Id shared with the matching [`Watch`]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue an event. Returns `false` if the watcher has gone away.
    pub fn send_event(&self, event: RegistryEvent<SubscriberInfo>) -> bool {
        self.tx.send(WatchNotification::Event(event)).is_ok()
    }

    /// Deliver a terminal error. The sender is consumed; nothing can follow it.
    pub fn fail(self, error: RegistryError) -> bool {
        self.tx.send(WatchNotification::Error(error)).is_ok()
    }

    /// End the watch without delivering anything further, queued items included.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::Release);
        // Dropping the sender wakes a receiver parked on an empty queue
        drop(self.tx);
    }

    /// Whether the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Caller side of a watch, consumed as a [`Stream`]
#[derive(Debug)]
pub struct Watch {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<WatchNotification>,
    cancelled: Arc<AtomicBool>,
    terminated: bool,
}

impl Watch {
    /// Create a connected sender/watch pair.
    pub fn channel() -> (WatchSender, Watch) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            WatchSender {
                id,
                tx,
                cancelled: cancelled.clone(),
            },
            Watch {
                id,
                rx,
                cancelled,
                terminated: false,
            },
        )
    }

    /// Unique id of this delivery path
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the backend cancelled this watch
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Drive this watch on a tokio task, feeding events and the terminal error to handlers.
    ///
    /// Handlers run on the spawned task, not the caller's. A handler that blocks stalls only
    /// this delivery path.
    pub fn dispatch<E, R>(mut self, mut on_event: E, on_error: R) -> JoinHandle<()>
    where
        E: FnMut(RegistryEvent<SubscriberInfo>) + Send + 'static,
        R: FnOnce(RegistryError) + Send + 'static,
    {
        tokio::spawn(async move {
            let id = self.id;
            while let Some(notification) = self.next().await {
                if self.is_cancelled() {
                    break;
                }
                match notification {
                    WatchNotification::Event(event) => on_event(event),
                    WatchNotification::Error(error) => {
                        debug!(watch = %id, "Watch terminated by error: {}", error);
                        on_error(error);
                        return;
                    }
                }
            }
            debug!(watch = %id, "Watch closed");
        })
    }
}

impl Stream for Watch {
    type Item = WatchNotification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        if self.is_cancelled() {
            self.terminated = true;
            self.rx.close();
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(WatchNotification::Error(error))) => {
                self.terminated = true;
                self.rx.close();
                Poll::Ready(Some(WatchNotification::Error(error)))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let (sender, mut watch) = Watch::channel();
        assert_eq!(sender.id(), watch.id());

        assert!(sender.send_event(RegistryEvent::added(SubscriberInfo::new("s1", vec![]))));
        assert!(sender.fail(RegistryError::WatchClosed("connection lost".to_string())));

        assert!(matches!(watch.next().await, Some(WatchNotification::Event(_))));
        assert!(matches!(watch.next().await, Some(WatchNotification::Error(_))));
        assert_eq!(watch.next().await, None);
        assert_eq!(watch.next().await, None);
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (sender, mut watch) = Watch::channel();
        drop(sender);
        assert_eq!(watch.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_discards_queued_items() {
        let (sender, mut watch) = Watch::channel();
        assert!(sender.send_event(RegistryEvent::added(SubscriberInfo::new("s1", vec![]))));
        assert!(sender.send_event(RegistryEvent::removed(SubscriberInfo::new("s1", vec![]))));
        sender.cancel();

        assert!(watch.is_cancelled());
        assert_eq!(watch.next().await, None);
        assert_eq!(watch.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_wakes_idle_dispatch() {
        let (sender, watch) = Watch::channel();
        let calls = Arc::new(Mutex::new(0));
        let counted = calls.clone();
        let handle = watch.dispatch(move |_| *counted.lock().unwrap() += 1, |_| {});

        tokio::task::yield_now().await;
        sender.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sender_sees_dropped_watch() {
        let (sender, watch) = Watch::channel();
        drop(watch);
        assert!(sender.is_closed());
        assert!(!sender.send_event(RegistryEvent::added(SubscriberInfo::new("s1", vec![]))));
    }

    #[tokio::test]
    async fn test_dispatch_calls_handlers() {
        let (sender, watch) = Watch::channel();
        let events = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let seen = events.clone();
        let failed = errors.clone();
        let handle = watch.dispatch(
            move |event| seen.lock().unwrap().push(event.kind),
            move |error| failed.lock().unwrap().push(error),
        );

        sender.send_event(RegistryEvent::added(SubscriberInfo::new("s1", vec![])));
        sender.send_event(RegistryEvent::removed(SubscriberInfo::new("s1", vec![])));
        sender.fail(RegistryError::WatchClosed("gone".to_string()));
        handle.await.unwrap();

        use crate::types::ChangeKind;
        assert_eq!(
            *events.lock().unwrap(),
            vec![ChangeKind::Added, ChangeKind::Removed]
        );
        assert_eq!(
            *errors.lock().unwrap(),
            vec![RegistryError::WatchClosed("gone".to_string())]
        );
    }
}
