//! # Flag Telemetry
//!
//! Logging and metrics for the Flagforge engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flag_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(&TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FF_SERVICE_NAME` | `flagforge` | Service name on every log line |
//! | `FF_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `FF_JSON_LOGS` | `false` | JSON formatted logs |
//! | `FF_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::{parse_flag, TelemetryConfig};
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, CACHE_HITS, CACHE_MISSES,
    COMPILE_DURATION, COMPILE_WARNINGS, CYCLE_DETECTIONS, PAYLOAD_COMPILATIONS,
    SAMPLE_EVALUATIONS, SUPERSEDED_REFRESHES,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed
    #[error("Tracing subscriber not installed: {0}")]
    TracingInit(String),

    #[error("Metrics registry: {0}")]
    MetricsInit(String),

    #[error("Invalid telemetry configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the tracing subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_tracing(config)
}

/// Create a span with subsystem context.
///
/// ```rust,ignore
/// let _span = subsystem_span!("compile_payload", subsystem = "payload-cache", environment = %env);
/// ```
#[macro_export]
macro_rules! subsystem_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
