//! Adapters for the Payload Cache

pub mod memory;

pub use memory::{
    InMemoryFeatureStore, InMemoryHoldoutStore, InMemoryOrganizationStore,
    InMemoryPayloadPersistence, InMemoryRefreshQueue, InMemorySavedGroupStore, OrganizationRevisions,
};
