//! Event fan-out to connected viewers.
//!
//! Every viewer owns a bounded queue. Publishing is a non-blocking `try_send`
//! into each queue; a viewer whose queue is full is removed from the registry
//! on the spot so the producer never waits on a slow consumer.
//!
//! `publish` does not log. It may run while the caller holds the state lock,
//! and the dashboard log layer feeds back into that state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::types::Event;

/// Default per-viewer queue capacity.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SubscriberId(u64);

struct Slot {
    id: SubscriberId,
    tx: mpsc::Sender<Event>,
}

struct HubInner {
    subscribers: Mutex<Vec<Slot>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Registry of viewer queues.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

/// Result of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers removed because their queue was full or closed.
    pub dropped: usize,
}

/// Receiving end of one viewer's queue.
pub struct Subscriber {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
}

/// Outcome of waiting on a subscriber queue.
#[derive(Debug, PartialEq)]
pub enum Recv {
    Event(Event),
    /// Nothing arrived within the timeout.
    Idle,
    /// The hub no longer holds this subscriber and the queue is drained.
    Closed,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a new viewer queue.
    pub fn subscribe(&self) -> Subscriber {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers.lock().push(Slot { id, tx });
        Subscriber { id, rx }
    }

    /// Remove a viewer queue. Safe to call more than once.
    ///
    /// Events still queued for the subscriber are discarded.
    pub fn unsubscribe(&self, subscriber: &mut Subscriber) {
        self.inner
            .subscribers
            .lock()
            .retain(|slot| slot.id != subscriber.id);
        subscriber.rx.close();
        while subscriber.rx.try_recv().is_ok() {}
    }

    /// Offer `event` to every registered subscriber without blocking.
    pub fn publish(&self, event: &Event) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        self.inner
            .subscribers
            .lock()
            .retain(|slot| match slot.tx.try_send(event.clone()) {
                Ok(()) => {
                    outcome.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    outcome.dropped += 1;
                    false
                }
            });
        outcome
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn is_subscribed(&self, subscriber: &Subscriber) -> bool {
        self.inner
            .subscribers
            .lock()
            .iter()
            .any(|slot| slot.id == subscriber.id)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("capacity", &self.inner.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Subscriber {
    /// Wait up to `timeout` for the next event.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Recv {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Recv::Event(event),
            Ok(None) => Recv::Closed,
            Err(_) => Recv::Idle,
        }
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("pending", &self.pending())
            .finish()
    }
}
