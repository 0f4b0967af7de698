//! # Flagforge Test Suite
//!
//! Cross-subsystem scenarios that need more than one crate to set up.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs      # End-to-end scenarios A, B and C
//!     ├── prerequisites.rs  # Cycles across compilation and evaluation
//!     ├── holdouts.rs       # Holdout project scoping
//!     ├── invalidation.rs   # Saved-group, holdout and organization edits
//!     ├── staleness.rs      # Priority chain over compiled features
//!     ├── concurrency.rs    # Concurrent refreshes and readers
//!     └── properties.rs     # Rule id uniqueness and hashing properties
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ff-tests
//! cargo test -p ff-tests integration::holdouts::
//! ```

#![allow(dead_code)]

pub mod integration;
