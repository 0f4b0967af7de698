//! Domain module for Bucketing

pub mod errors;
pub mod value_objects;

pub use errors::*;
pub use value_objects::*;
