//! Prometheus metrics for the Flagforge engine.
//!
//! All metrics follow the naming convention: `ff_<subsystem>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PAYLOAD CACHE
    // =========================================================================

    /// Payload compilations by outcome (committed, superseded, failed)
    pub static ref PAYLOAD_COMPILATIONS: CounterVec = CounterVec::new(
        Opts::new("ff_payload_compilations_total", "Total payload compilations"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Cache reads served from memory
    pub static ref CACHE_HITS: Counter = Counter::new(
        "ff_payload_cache_hits_total",
        "Payload reads served from the in-memory cache"
    ).expect("metric creation failed");

    /// Cache reads that fell through to persistence or compilation
    pub static ref CACHE_MISSES: Counter = Counter::new(
        "ff_payload_cache_misses_total",
        "Payload reads not served from the in-memory cache"
    ).expect("metric creation failed");

    /// Refreshes skipped because a newer one overtook them
    pub static ref SUPERSEDED_REFRESHES: Counter = Counter::new(
        "ff_payload_superseded_refreshes_total",
        "Refreshes skipped because a newer refresh was requested"
    ).expect("metric creation failed");

    /// Payload compile duration
    pub static ref COMPILE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ff_payload_compile_duration_seconds",
            "Time spent compiling one payload"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // RULE COMPILER
    // =========================================================================

    /// Rules dropped with a compilation warning, by error kind
    pub static ref COMPILE_WARNINGS: CounterVec = CounterVec::new(
        Opts::new("ff_compiler_warnings_total", "Rules dropped with a compilation warning"),
        &["kind"]
    ).expect("metric creation failed");

    /// Features excluded because of a prerequisite cycle
    pub static ref CYCLE_DETECTIONS: Counter = Counter::new(
        "ff_compiler_cycle_detections_total",
        "Features excluded because of a prerequisite cycle"
    ).expect("metric creation failed");

    // =========================================================================
    // EVALUATION
    // =========================================================================

    /// Sample and remote evaluations by result source
    pub static ref SAMPLE_EVALUATIONS: CounterVec = CounterVec::new(
        Opts::new("ff_evaluations_total", "Sample and remote evaluations"),
        &["source"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PAYLOAD_COMPILATIONS.clone()),
        Box::new(CACHE_HITS.clone()),
        Box::new(CACHE_MISSES.clone()),
        Box::new(SUPERSEDED_REFRESHES.clone()),
        Box::new(COMPILE_DURATION.clone()),
        Box::new(COMPILE_WARNINGS.clone()),
        Box::new(CYCLE_DETECTIONS.clone()),
        Box::new(SAMPLE_EVALUATIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
