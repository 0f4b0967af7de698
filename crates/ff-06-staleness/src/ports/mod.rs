//! Ports module for the Staleness Classifier

pub mod inbound;

pub use inbound::StalenessApi;
