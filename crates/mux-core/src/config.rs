//! # Processor Configuration
//!
//! Configuration for the request processor.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::domain::{
    invariant_positive_timeout, invariant_write_queue_capacity, MuxError,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_WRITE_QUEUE_CAPACITY,
};

/// Request processor configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Round-trip timeout per request in milliseconds.
    ///
    /// The clock starts when `send` begins and is not reset when the write
    /// completes.
    pub request_timeout_ms: u64,

    /// Maximum requests queued for the writer task.
    pub write_queue_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: millis_rounded_up(DEFAULT_REQUEST_TIMEOUT),
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
        }
    }
}

impl ProcessorConfig {
    /// Create a config with the given round-trip timeout.
    ///
    /// Fractions of a millisecond round up, so only a zero timeout is
    /// rejected by [`validate`](Self::validate).
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            request_timeout_ms: millis_rounded_up(timeout),
            ..Self::default()
        }
    }

    /// Create a config for testing (short timeout, small queue).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 100,
            write_queue_capacity: 64,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MUX_REQUEST_TIMEOUT_MS`: Round-trip timeout (default: 5000)
    /// - `MUX_WRITE_QUEUE_CAPACITY`: Writer queue capacity (default: 1024)
    ///
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            request_timeout_ms: env::var("MUX_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),

            write_queue_capacity: env::var("MUX_WRITE_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.write_queue_capacity),
        }
    }

    /// Round-trip timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject values the processor cannot run with.
    pub fn validate(&self) -> Result<(), MuxError> {
        invariant_positive_timeout(self.request_timeout())?;
        invariant_write_queue_capacity(self.write_queue_capacity)
    }
}

/// Whole milliseconds, rounded up and saturating at `u64::MAX`.
fn millis_rounded_up(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
