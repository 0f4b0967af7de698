//! Ports module for the Payload Cache

pub mod inbound;
pub mod outbound;

pub use inbound::PayloadCacheApi;
pub use outbound::{
    FeatureStore, HoldoutStore, OrganizationStore, PayloadPersistence, RefreshQueue,
    SavedGroupStore,
};
