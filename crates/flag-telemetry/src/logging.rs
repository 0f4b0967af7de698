//! Feature-scoped log lines.
//!
//! The compiler, the payload cache and the evaluator all log with the same
//! `subsystem`, `feature_id` and `environment` fields, so one flag can be
//! followed from compilation through to evaluation with a single filter.

/// `log_feature_event!(warn, "payload-cache", "Rule dropped", feature_id, environment, rule_id = %id)`
#[macro_export]
macro_rules! log_feature_event {
    ($level:ident, $subsystem:expr, $msg:expr, $feature_id:expr, $environment:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            feature_id = %$feature_id,
            environment = %$environment,
            $($($field)*,)?
            $msg
        )
    };
}
