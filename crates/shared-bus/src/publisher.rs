//! # Change Publisher
//!
//! Stores announce committed writes here. Delivery is fire-and-forget: a
//! store never waits on the payload cache, and an event nobody listens to is
//! counted and dropped.

use crate::events::{EventFilter, EventTopic, FlagEvent};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Write side of the bus, injected into every store adapter.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Announce a committed write. Returns how many subscriptions were live.
    async fn publish(&self, event: FlagEvent) -> usize;
}

/// Broadcast bus shared by the stores and the invalidation listener.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<FlagEvent>,
    per_topic: Mutex<HashMap<EventTopic, u64>>,
    unheard: AtomicU64,
    /// Events overwritten before a slow subscriber read them
    lagged: Arc<AtomicU64>,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            per_topic: Mutex::new(HashMap::new()),
            unheard: AtomicU64::new(0),
            lagged: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Listen for events accepted by `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, organizations = ?filter.organizations, "Subscribed to flag events");
        Subscription::new(self.sender.subscribe(), filter, self.lagged.clone())
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published on `topic` since the bus was created.
    #[must_use]
    pub fn published(&self, topic: EventTopic) -> u64 {
        let counts = self.per_topic.lock();
        match topic {
            EventTopic::All => counts.values().sum(),
            topic => counts.get(&topic).copied().unwrap_or(0),
        }
    }

    /// Events published while nobody was subscribed.
    #[must_use]
    pub fn unheard(&self) -> u64 {
        self.unheard.load(Ordering::Relaxed)
    }

    /// Events subscribers missed because they fell behind.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: FlagEvent) -> usize {
        let topic = event.topic();
        *self.per_topic.lock().entry(topic).or_insert(0) += 1;

        trace!(topic = ?topic, organization = %event.organization(), "Publishing flag event");
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                self.unheard.fetch_add(1, Ordering::Relaxed);
                debug!(topic = ?topic, "No subscriber for flag event");
                0
            }
        }
    }
}
