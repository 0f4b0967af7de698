//! Compilation steps

pub mod conditions;
pub mod environments;
pub mod holdouts;
pub mod rule_ids;
pub mod saved_groups;
