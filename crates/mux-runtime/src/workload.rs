//! # Workload
//!
//! Concurrent workers issuing fresh-identifier requests against a running
//! processor, and the tally of what happened to each request.

use futures::future::join_all;
use mux_core::{MuxError, Request, RequestId, RequestProcessorApi};
use mux_telemetry::log_request_event;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-outcome request counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadOutcomes {
    /// Requests issued.
    pub sent: u64,
    /// Matching responses received.
    pub completed: u64,
    /// Round-trip timeouts.
    pub timeouts: u64,
    /// Requests abandoned when the run ended.
    pub cancelled: u64,
    /// Any other failure.
    pub failures: u64,
    /// Responses carrying the wrong identifier. Always zero for a correct
    /// processor.
    pub mismatched: u64,
}

#[derive(Default)]
struct Tally {
    sent: AtomicU64,
    completed: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    failures: AtomicU64,
    mismatched: AtomicU64,
}

impl Tally {
    fn record(&self, id: RequestId, outcome: &Result<mux_core::Response, MuxError>) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Ok(response) if response.id() == id => &self.completed,
            Ok(response) => {
                warn!(request_id = %id, response_id = %response.id(), "Mismatched response");
                &self.mismatched
            }
            Err(err) if err.is_timeout() => &self.timeouts,
            Err(err) if err.is_cancelled() => &self.cancelled,
            Err(err) => {
                log_request_event!(warn, "workload", "Request failed", id, error = %err);
                &self.failures
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WorkloadOutcomes {
        WorkloadOutcomes {
            sent: self.sent.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            mismatched: self.mismatched.load(Ordering::Relaxed),
        }
    }
}

/// Drive `processor` with `workers` concurrent senders until `duration`
/// elapses or `cancel` fires.
///
/// Requests still in flight when the run ends are cancelled. A worker
/// stops early if the processor stops accepting requests.
pub async fn run_workload<P>(
    processor: Arc<P>,
    workers: usize,
    duration: Duration,
    cancel: &CancellationToken,
) -> WorkloadOutcomes
where
    P: RequestProcessorApi + ?Sized + 'static,
{
    let tally = Arc::new(Tally::default());
    let run = cancel.child_token();
    let started_at = Instant::now();

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let processor = Arc::clone(&processor);
            let tally = Arc::clone(&tally);
            let run = run.clone();
            tokio::spawn(async move { worker_loop(worker, processor, tally, run).await })
        })
        .collect();

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = run.cancelled() => {}
    }
    run.cancel();

    for joined in join_all(handles).await {
        if let Err(err) = joined {
            warn!(error = %err, "Worker task failed");
        }
    }

    let outcomes = tally.snapshot();
    tracing::info!(
        workers,
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        sent = outcomes.sent,
        completed = outcomes.completed,
        timeouts = outcomes.timeouts,
        "Workload finished"
    );
    outcomes
}

async fn worker_loop<P>(
    worker: usize,
    processor: Arc<P>,
    tally: Arc<Tally>,
    run: CancellationToken,
) where
    P: RequestProcessorApi + ?Sized,
{
    let mut sequence: u64 = 0;
    while !run.is_cancelled() {
        let id = RequestId::new();
        let payload = format!("worker-{worker}-{sequence}").into_bytes();
        sequence += 1;

        log_request_event!(trace, "workload", "Sending request", id, worker);
        let outcome = processor.send(Request::new(id, payload), &run).await;
        if matches!(outcome, Err(MuxError::NotRunning)) {
            break;
        }
        tally.record(id, &outcome);
    }
}
