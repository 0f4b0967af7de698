//! # Shared Bus - Change Notifications
//!
//! Stores publish a `FlagEvent` after every committed write; the payload
//! cache subscribes and turns each event into a scoped refresh job.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Feature /    │                    │ Payload      │
//! │ Group store  │    publish()       │ cache        │
//! │              │ ──────┐            │ listener     │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, FlagEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Events buffered per subscription before the oldest are overwritten.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
