//! # Mux Runtime
//!
//! Runs a load against the request processor over the loopback peer and
//! prints a JSON report.
//!
//! ## Shutdown
//!
//! Ctrl+C ends the sending phase early; the processor is still stopped
//! gracefully and the report is still printed.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mux_runtime::{LoadRuntime, RuntimeConfig};
use mux_telemetry::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = RuntimeConfig::from_env();

    // Initialize logging
    let _logging = init_logging(&config.telemetry).context("Failed to initialize logging")?;

    let runtime = LoadRuntime::new(config).context("Failed to build load runtime")?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl+C received, ending run");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }
    });

    let report = runtime.run(&shutdown).await.context("Load run failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );

    Ok(())
}
