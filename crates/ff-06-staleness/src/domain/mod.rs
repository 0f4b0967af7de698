//! Domain module for the Staleness Classifier

pub mod classification;
pub mod errors;

pub use classification::*;
pub use errors::*;
