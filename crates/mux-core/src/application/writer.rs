//! # Write Pump
//!
//! Dedicated writer task for the non-reentrant transport `write`.
//!
//! ```text
//! send 1 ─┐
//! send 2 ─┼─► mpsc::Sender<WriteJob> ─► Write Pump ─► Transport::write
//! send N ─┘
//! ```
//!
//! Callers never hold a lock while a write is in flight; the pump is the
//! only task that calls `write`, one job at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{MuxError, Request, TransportError};
use crate::ports::Transport;

/// A request waiting for the pump.
struct WriteJob {
    request: Request,
    /// Cancelled when the caller stops caring about this write.
    cancel: CancellationToken,
    /// Outcome of the write.
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// Handle for queueing writes. Cheap to clone.
///
/// The pump keeps running while any handle is alive, so a write queued
/// through a live handle is always answered.
#[derive(Clone)]
pub(crate) struct WriteQueue {
    tx: mpsc::Sender<WriteJob>,
}

impl WriteQueue {
    /// Queue `request` and wait for the transport to accept it.
    ///
    /// Fails with the transport's error, or [`TransportError::Cancelled`]
    /// if `cancel` fired before the pump reached the job.
    pub(crate) async fn write(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<(), MuxError> {
        let (done, outcome) = oneshot::channel();
        self.tx
            .send(WriteJob {
                request,
                cancel,
                done,
            })
            .await
            .map_err(|_| MuxError::NotRunning)?;

        outcome.await.map_err(|_| MuxError::NotRunning)??;
        Ok(())
    }
}

/// Spawn the pump. It exits once every [`WriteQueue`] handle is dropped
/// and the jobs already queued are finished.
pub(crate) fn spawn_write_pump<T>(
    transport: Arc<T>,
    capacity: usize,
) -> (WriteQueue, JoinHandle<()>)
where
    T: Transport + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(run_write_pump(transport, rx));
    (WriteQueue { tx }, task)
}

async fn run_write_pump<T>(transport: Arc<T>, mut jobs: mpsc::Receiver<WriteJob>)
where
    T: Transport + ?Sized,
{
    while let Some(job) = jobs.recv().await {
        let id = job.request.id();
        if job.done.is_closed() {
            debug!(request_id = %id, "Skipping write for abandoned request");
            continue;
        }
        if job.cancel.is_cancelled() {
            debug!(request_id = %id, "Write cancelled before it started");
            let _ = job.done.send(Err(TransportError::Cancelled));
            continue;
        }

        let outcome = transport.write(&job.request, &job.cancel).await;
        match &outcome {
            Ok(()) => debug!(request_id = %id, "Request written"),
            Err(err) if err.is_cancellation() => {
                debug!(request_id = %id, "Write cancelled by caller")
            }
            Err(err) => warn!(request_id = %id, error = %err, "Write failed"),
        }
        let _ = job.done.send(outcome);
    }

    debug!("Write pump stopped");
}
