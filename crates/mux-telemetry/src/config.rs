//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every event
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `mux_core=debug,info`
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to include thread ids in each event
    pub with_thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "duplex-mux".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_thread_ids: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MUX_SERVICE_NAME`: Service name (default: duplex-mux)
    /// - `MUX_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `MUX_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `MUX_THREAD_IDS`: Include thread ids (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("MUX_SERVICE_NAME")
                .unwrap_or_else(|_| "duplex-mux".to_string()),

            log_level: env::var("MUX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("MUX_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            with_thread_ids: env::var("MUX_THREAD_IDS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// Configuration from the environment with a fixed service name.
    pub fn for_service(name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = name.to_string();
        config
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
