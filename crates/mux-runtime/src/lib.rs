//! # Mux Runtime Library
//!
//! Load runner for the request processor. The main entry point is the
//! `main.rs` binary; the library exposes the runner for tests.
//!
//! ## Run Sequence
//!
//! 1. Load configuration (from env)
//! 2. Start a processor over the loopback peer
//! 3. Run workers for the configured duration
//! 4. Stop the processor, bounded by the grace deadline
//! 5. Report counters as JSON

#![warn(missing_docs)]

pub mod config;
pub mod workload;

use std::sync::Arc;
use std::time::Instant;

use mux_core::{
    LoopbackStats, LoopbackTransport, MuxError, ProcessorState, ProcessorStats,
    RequestProcessor, RequestProcessorApi,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use config::RuntimeConfig;
pub use workload::{run_workload, WorkloadOutcomes};

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration rejected before anything started.
    #[error("Invalid runtime configuration: {0}")]
    Config(String),

    /// The processor refused an operation.
    #[error(transparent)]
    Mux(#[from] MuxError),
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Configuration the run used.
    pub config: RuntimeConfig,
    /// Request outcomes seen by the workers.
    pub outcomes: WorkloadOutcomes,
    /// Processor counters after stop.
    pub processor: ProcessorStats,
    /// Simulated peer counters.
    pub peer: LoopbackStats,
    /// Time spent sending, in milliseconds.
    pub run_ms: u64,
    /// Time `stop` took, in milliseconds.
    pub stop_ms: u64,
    /// Calls still pending when `stop` returned.
    pub pending_after_stop: usize,
    /// Final processor state.
    pub final_state: ProcessorState,
}

/// Load runner owning a processor over the loopback peer.
pub struct LoadRuntime {
    config: RuntimeConfig,
    transport: Arc<LoopbackTransport>,
    processor: Arc<RequestProcessor<LoopbackTransport>>,
}

impl LoadRuntime {
    /// Validate `config` and build the processor.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let transport = Arc::new(LoopbackTransport::new(config.loopback.clone()));
        let processor = Arc::new(RequestProcessor::new(
            Arc::clone(&transport),
            config.processor.clone(),
        )?);
        Ok(Self {
            config,
            transport,
            processor,
        })
    }

    /// The processor under load.
    pub fn processor(&self) -> &Arc<RequestProcessor<LoopbackTransport>> {
        &self.processor
    }

    /// Run the full sequence. `shutdown` ends the sending phase early.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<RunReport, RuntimeError> {
        info!(
            workers = self.config.workers,
            run_secs = self.config.run_secs,
            timeout_ms = self.config.processor.request_timeout_ms,
            "Starting load run"
        );
        self.processor.start(shutdown).await?;

        let run_started = Instant::now();
        let outcomes = run_workload(
            Arc::clone(&self.processor),
            self.config.workers,
            self.config.run_duration(),
            shutdown,
        )
        .await;
        let run_ms = run_started.elapsed().as_millis() as u64;

        // Stop gets its own deadline, independent of the shutdown signal
        let grace = CancellationToken::new();
        let timer = tokio::spawn({
            let grace = grace.clone();
            let patience = self.config.stop_grace();
            async move {
                tokio::time::sleep(patience).await;
                grace.cancel();
            }
        });

        let stop_started = Instant::now();
        self.processor.stop(&grace).await?;
        let stop_ms = stop_started.elapsed().as_millis() as u64;
        timer.abort();

        let pending_after_stop = self.processor.pending_count();
        if pending_after_stop > 0 {
            warn!(pending_after_stop, "Stop returned with calls still pending");
        }

        let report = RunReport {
            config: self.config.clone(),
            outcomes,
            processor: self.processor.stats(),
            peer: self.transport.stats(),
            run_ms,
            stop_ms,
            pending_after_stop,
            final_state: self.processor.state(),
        };
        info!(
            completed = report.outcomes.completed,
            timeouts = report.outcomes.timeouts,
            stop_ms,
            "Load run finished"
        );
        Ok(report)
    }
}
