//! Structured logging setup.
//!
//! Events carry consistent fields so that request traffic can be followed
//! across the processor, its background tasks and the load runner:
//! - `component`: emitting component (processor, dispatch, runtime, ...)
//! - `request_id`: correlation identifier of the request
//! - Additional context fields

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle returned by [`init_logging`]. Hold it for the life of the process.
#[derive(Debug)]
pub struct LoggingGuard {
    service_name: String,
}

impl LoggingGuard {
    /// Service name the subscriber was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down logging");
    }
}

/// Install the global subscriber.
///
/// `log_level` is parsed as an `EnvFilter` directive. A second call fails
/// with [`TelemetryError::AlreadyInitialized`] instead of panicking.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if config.json_logs {
        // JSON output for log shipping
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(config.with_thread_ids)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    } else {
        // Human output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(config.with_thread_ids)
            .with_file(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        service_name: config.service_name.clone(),
    })
}

/// Log a request-related event with standard fields.
///
/// ```rust,ignore
/// log_request_event!(debug, "runtime", "Request completed", request.id(), elapsed_ms = 3);
/// ```
#[macro_export]
macro_rules! log_request_event {
    ($level:ident, $component:expr, $msg:expr, $request_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            request_id = %$request_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a lifecycle event for a component.
#[macro_export]
macro_rules! log_lifecycle_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}
