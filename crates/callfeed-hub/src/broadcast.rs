use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use callfeed_core::CallEvent;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub type SubscriberId = u64;

/// Outcome of a single publish, mostly for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscriber queue was full; that subscriber misses this event.
    pub skipped: usize,
    /// Subscriber had gone away and was unregistered.
    pub removed: usize,
}

/// Fan-out of call events to every live subscriber.
///
/// Each subscriber gets its own bounded queue. Publishing never waits on a
/// subscriber: a full queue drops the event for that subscriber only, and a
/// closed queue unregisters it.
pub struct BroadcastHub {
    subscribers: DashMap<SubscriberId, mpsc::Sender<Arc<CallEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
    shutdown: CancellationToken,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Add a subscriber. Dropping the returned `Subscription` unregisters it.
    pub fn register(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.insert(id, tx);
        info!(subscriber = id, live = self.subscribers.len(), "subscriber registered");
        Subscription {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Remove a subscriber. Safe to call any number of times, from any
    /// thread; returns `true` only for the call that actually removed it.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            info!(subscriber = id, live = self.subscribers.len(), "subscriber unregistered");
        }
        removed
    }

    /// Deliver `event` to every registered subscriber, best-effort.
    pub fn publish(&self, event: &Arc<CallEvent>) -> PublishReport {
        let mut report = PublishReport::default();
        let mut gone = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = *entry.key(), id = event.id, "subscriber queue full, event skipped");
                    report.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => gone.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shard guards are still
        // held while iterating.
        for id in gone {
            if self.unregister(id) {
                report.removed += 1;
            }
        }
        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Token cancelled on server shutdown; sessions select on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal every open session to close.
    pub fn shutdown(&self) {
        info!(live = self.subscribers.len(), "closing all subscriber sessions");
        self.shutdown.cancel();
    }
}

/// One registration with the hub: the receiving half of the subscriber's
/// queue plus the obligation to unregister.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<CallEvent>>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next published event; `None` once unregistered and drained.
    pub async fn recv(&mut self) -> Option<Arc<CallEvent>> {
        self.rx.recv().await
    }

    /// Unregister and stop accepting events. Idempotent.
    pub fn cancel(&mut self) {
        self.hub.unregister(self.id);
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}
