//! Telemetry configuration from environment variables.

use std::env;

/// Where log lines go and how they look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Level (`info`) or a full `EnvFilter` directive (`flag_runtime=debug,warn`)
    pub log_level: String,
    pub console_output: bool,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "flagforge".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `FF_SERVICE_NAME`, `FF_LOG_LEVEL` (falling back to `RUST_LOG`),
    /// `FF_CONSOLE_OUTPUT` and `FF_JSON_LOGS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("FF_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("FF_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            console_output: lookup("FF_CONSOLE_OUTPUT")
                .map_or(defaults.console_output, |v| parse_flag(&v, defaults.console_output)),
            json_logs: lookup("FF_JSON_LOGS")
                .map_or(defaults.json_logs, |v| parse_flag(&v, defaults.json_logs)),
        }
    }
}

/// Lenient boolean parsing for environment flags; anything unrecognised
/// keeps `default`.
pub fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
