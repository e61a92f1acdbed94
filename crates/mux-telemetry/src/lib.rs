//! # Mux Telemetry
//!
//! Structured logging for duplex-mux services.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mux_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_logging(&config).expect("Failed to init logging");
//!
//!     // Events from every crate now reach the subscriber
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MUX_SERVICE_NAME` | `duplex-mux` | Service name in events |
//! | `MUX_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `MUX_JSON_LOGS` | `false` | Emit JSON instead of human output |
//! | `MUX_THREAD_IDS` | `false` | Include thread ids |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    /// The filter directive could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
