//! Inbound Ports (Driving Ports)

use crate::application::service::StalenessContext;
use crate::domain::classification::StalenessReport;
use shared_types::Feature;

/// Primary Staleness API (Driving Port)
pub trait StalenessApi: Send + Sync {
    /// Classify one feature in every environment of `ctx`.
    fn classify_staleness(&self, feature: &Feature, ctx: &StalenessContext<'_>) -> StalenessReport;

    /// Classify every feature of `ctx`.
    fn classify_all(&self, ctx: &StalenessContext<'_>) -> Vec<StalenessReport>;
}
