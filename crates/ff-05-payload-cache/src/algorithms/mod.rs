//! Algorithms for the Payload Cache

pub mod invalidation;
pub mod projection;
pub mod secure;

pub use invalidation::{affected_connections, payload_keys_for};
pub use projection::{collect_group_references, project_contents, ProjectionOptions};
pub use secure::hash_secure_attributes;
