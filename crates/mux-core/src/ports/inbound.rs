//! # Inbound Ports
//!
//! API trait defining what the request processor offers application code.

use crate::domain::{MuxError, ProcessorState, ProcessorStats, Request, Response};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Request Processor API - inbound port.
#[async_trait]
pub trait RequestProcessorApi: Send + Sync {
    /// One-shot initialization. Returns once the dispatch loop is live.
    async fn start(&self, cancel: &CancellationToken) -> Result<(), MuxError>;

    /// One-shot graceful shutdown, bounded by `cancel`.
    ///
    /// Never fails because requests are still outstanding.
    async fn stop(&self, cancel: &CancellationToken) -> Result<(), MuxError>;

    /// Send a request and wait for its own response.
    ///
    /// Safe to call from any number of tasks at once.
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, MuxError>;

    /// Current lifecycle state.
    fn state(&self) -> ProcessorState;

    /// Number of calls awaiting a response.
    fn pending_count(&self) -> usize;

    /// Counter snapshot.
    fn stats(&self) -> ProcessorStats;
}
