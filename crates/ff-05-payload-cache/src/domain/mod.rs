//! Domain module for the Payload Cache

pub mod errors;
pub mod jobs;
pub mod snapshot;

pub use errors::*;
pub use jobs::*;
pub use snapshot::*;
