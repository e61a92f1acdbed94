//! # Runtime Configuration
//!
//! Settings for the load runner, loaded from the environment.

use mux_core::{LoopbackConfig, ProcessorConfig};
use mux_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::RuntimeError;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Concurrent workers issuing requests.
    pub workers: usize,
    /// How long workers keep sending.
    pub run_secs: u64,
    /// Patience granted to `stop` before it gives up draining.
    pub stop_grace_ms: u64,
    /// Request processor configuration.
    pub processor: ProcessorConfig,
    /// Simulated peer configuration.
    pub loopback: LoopbackConfig,
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            run_secs: 10,
            stop_grace_ms: 1000,
            processor: ProcessorConfig::default(),
            loopback: LoopbackConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MUX_WORKERS`: Concurrent workers (default: 2)
    /// - `MUX_RUN_SECS`: Run duration in seconds (default: 10)
    /// - `MUX_STOP_GRACE_MS`: Stop deadline in milliseconds (default: 1000)
    /// - `MUX_MAX_LATENCY_MS`: Peer latency upper bound (default: 10)
    /// - `MUX_DUPLICATE_PROBABILITY`: Chance of a duplicate answer (default: 0.5)
    /// - `MUX_DROP_PROBABILITY`: Chance of no answer (default: 0.0)
    ///
    /// Processor and logging settings come from their own loaders.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_or("MUX_WORKERS", defaults.workers),
            run_secs: env_or("MUX_RUN_SECS", defaults.run_secs),
            stop_grace_ms: env_or("MUX_STOP_GRACE_MS", defaults.stop_grace_ms),
            processor: ProcessorConfig::from_env(),
            loopback: LoopbackConfig {
                max_latency_ms: env_or("MUX_MAX_LATENCY_MS", defaults.loopback.max_latency_ms),
                duplicate_probability: env_or(
                    "MUX_DUPLICATE_PROBABILITY",
                    defaults.loopback.duplicate_probability,
                ),
                drop_probability: env_or("MUX_DROP_PROBABILITY", defaults.loopback.drop_probability),
                ..defaults.loopback
            },
            telemetry: TelemetryConfig::for_service("mux-runtime"),
        }
    }

    /// Small, fast configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            workers: 4,
            run_secs: 1,
            stop_grace_ms: 200,
            processor: ProcessorConfig::for_testing(),
            loopback: LoopbackConfig::for_testing(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Run duration.
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }

    /// Stop deadline.
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Reject settings the runner cannot use.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.workers == 0 {
            return Err(RuntimeError::Config("workers must be at least 1".to_string()));
        }
        for (name, p) in [
            ("duplicate_probability", self.loopback.duplicate_probability),
            ("drop_probability", self.loopback.drop_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(RuntimeError::Config(format!(
                    "{name} must be within [0, 1], got {p}"
                )));
            }
        }
        self.processor.validate()?;
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
