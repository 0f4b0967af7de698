//! # Subscriptions
//!
//! A subscription sees every broadcast and keeps the events its filter
//! accepts. Falling behind is not fatal: the payload cache recompiles from a
//! fresh snapshot anyway, so skipped events only cost a coarser refresh.

use crate::events::{EventFilter, FlagEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

pub struct Subscription {
    receiver: broadcast::Receiver<FlagEvent>,
    filter: EventFilter,
    lagged: Arc<AtomicU64>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<FlagEvent>,
        filter: EventFilter,
        lagged: Arc<AtomicU64>,
    ) -> Self {
        Self {
            receiver,
            filter,
            lagged,
        }
    }

    /// Next accepted event, or `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<FlagEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next accepted event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<FlagEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Every accepted event already buffered.
    pub fn drain(&mut self) -> Result<Vec<FlagEvent>, SubscriptionError> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv()? {
            events.push(event);
        }
        Ok(events)
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    fn record_lag(&self, missed: u64) {
        self.lagged.fetch_add(missed, Ordering::Relaxed);
        warn!(missed, topics = ?self.filter.topics, "Subscriber fell behind; events skipped");
    }
}
