//! # Request Processor Service
//!
//! Application service multiplexing concurrent callers over one transport.
//!
//! ```text
//! send ──► register slot ──► WriteQueue ──► Write Pump ──► Transport::write
//!   ▲                                                            │
//!   │                                                          (peer)
//!   │                                                            ▼
//!   └──── slot resolved ◄── PendingCallTable ◄── Dispatch Loop ◄─ Transport::read
//! ```
//!
//! Each `send` races its round trip against the caller's cancellation and a
//! deadline fixed at submission. Whoever removes the table entry first owns
//! the outcome.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::dispatch::run_dispatch_loop;
use crate::application::writer::{spawn_write_pump, WriteQueue};
use crate::config::ProcessorConfig;
use crate::domain::{
    invariant_state, MuxError, PendingCallTable, PendingSlot, ProcessorState, ProcessorStats,
    Request, RequestId, Response, RetractReason, TransportError,
};
use crate::ports::{RequestProcessorApi, Transport};

/// Background tasks owned by a running processor.
///
/// The pump outlives this handle until every accepted write is finished.
struct Runtime {
    dispatch_lifetime: CancellationToken,
    writer: WriteQueue,
    dispatch: JoinHandle<Result<(), TransportError>>,
    pump: JoinHandle<()>,
}

impl Runtime {
    /// Stop reading. The pump exits on its own once its handles are gone.
    fn cancel(self) {
        self.dispatch_lifetime.cancel();
    }
}

struct Lifecycle {
    state: ProcessorState,
    runtime: Option<Runtime>,
}

/// Request Processor - correlates responses to concurrent callers.
pub struct RequestProcessor<T: Transport + ?Sized + 'static> {
    /// Shared duplex channel.
    transport: Arc<T>,
    /// Configuration.
    config: ProcessorConfig,
    /// Round-trip timeout, fixed at construction.
    request_timeout: Duration,
    /// In-flight calls.
    table: Arc<PendingCallTable>,
    /// State and background tasks. Never held across an await.
    lifecycle: Mutex<Lifecycle>,
}

impl<T: Transport + ?Sized + 'static> RequestProcessor<T> {
    /// Create a processor over `transport`.
    ///
    /// Fails with [`MuxError::InvalidConfig`] for a zero timeout or an
    /// empty write queue.
    pub fn new(transport: Arc<T>, config: ProcessorConfig) -> Result<Self, MuxError> {
        config.validate()?;
        Ok(Self {
            transport,
            request_timeout: config.request_timeout(),
            config,
            table: Arc::new(PendingCallTable::new()),
            lifecycle: Mutex::new(Lifecycle {
                state: ProcessorState::Created,
                runtime: None,
            }),
        })
    }

    /// Create a processor with default settings and the given timeout.
    pub fn with_timeout(transport: Arc<T>, timeout: Duration) -> Result<Self, MuxError> {
        Self::new(transport, ProcessorConfig::with_timeout(timeout))
    }

    /// Configuration in use.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Whether the dispatch loop is still reading.
    ///
    /// `false` before start, after stop, or after a fatal read failure.
    pub fn is_dispatch_alive(&self) -> bool {
        self.lifecycle
            .lock()
            .runtime
            .as_ref()
            .is_some_and(|runtime| !runtime.dispatch.is_finished())
    }

    fn writer(&self) -> Result<WriteQueue, MuxError> {
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.state.accepts_requests() {
            return Err(MuxError::NotRunning);
        }
        lifecycle
            .runtime
            .as_ref()
            .map(|runtime| runtime.writer.clone())
            .ok_or(MuxError::NotRunning)
    }

    /// Undo a start that never confirmed the dispatch loop.
    fn abandon_start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Some(runtime) = lifecycle.runtime.take() {
            runtime.cancel();
        }
        lifecycle.state = ProcessorState::Stopped;
    }

    fn finish_stop(&self) {
        self.lifecycle.lock().state = ProcessorState::Stopped;
    }
}

/// Write the request, then wait for its response.
async fn round_trip(
    writer: &WriteQueue,
    request: Request,
    write_cancel: &CancellationToken,
    slot: &mut PendingSlot,
) -> Result<Response, MuxError> {
    writer.write(request, write_cancel.clone()).await?;
    slot.wait().await
}

/// Deadline `timeout` from now, capped for timeouts past the clock's range.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

fn retract_reason(err: &MuxError) -> RetractReason {
    match err {
        MuxError::Timeout { .. } => RetractReason::Timeout,
        MuxError::Cancelled(_) => RetractReason::Cancelled,
        _ => RetractReason::TransportFailure,
    }
}

/// Retracts the pending call if the `send` future is dropped mid-flight.
struct RetractOnDrop<'a> {
    table: &'a PendingCallTable,
    id: RequestId,
    write_cancel: CancellationToken,
    armed: bool,
}

impl RetractOnDrop<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RetractOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.write_cancel.cancel();
        if self
            .table
            .remove_if_present(&self.id, RetractReason::Abandoned)
        {
            debug!(request_id = %self.id, "Send dropped before completion");
        }
    }
}

#[async_trait]
impl<T: Transport + ?Sized + 'static> RequestProcessorApi for RequestProcessor<T> {
    async fn start(&self, cancel: &CancellationToken) -> Result<(), MuxError> {
        let ready = {
            let mut lifecycle = self.lifecycle.lock();
            invariant_state(lifecycle.state, ProcessorState::Created)?;

            let dispatch_lifetime = CancellationToken::new();
            let (ready_tx, ready_rx) = oneshot::channel();

            let dispatch = tokio::spawn(run_dispatch_loop(
                Arc::clone(&self.transport),
                Arc::clone(&self.table),
                dispatch_lifetime.clone(),
                ready_tx,
            ));
            let (writer, pump) = spawn_write_pump(
                Arc::clone(&self.transport),
                self.config.write_queue_capacity,
            );

            lifecycle.runtime = Some(Runtime {
                dispatch_lifetime,
                writer,
                dispatch,
                pump,
            });
            lifecycle.state = ProcessorState::Running;
            ready_rx
        };

        let confirmed = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MuxError::Interrupted("start")),
            ready = ready => ready.map_err(|_| MuxError::NotRunning),
        };
        if let Err(err) = confirmed {
            warn!(error = %err, "Request processor failed to start");
            self.abandon_start();
            return Err(err);
        }

        info!(
            timeout_ms = self.config.request_timeout_ms,
            write_queue_capacity = self.config.write_queue_capacity,
            "Request processor started"
        );
        Ok(())
    }

    async fn stop(&self, cancel: &CancellationToken) -> Result<(), MuxError> {
        let runtime = {
            let mut lifecycle = self.lifecycle.lock();
            invariant_state(lifecycle.state, ProcessorState::Running)?;
            lifecycle.state = ProcessorState::Stopping;
            lifecycle.runtime.take()
        };
        let Some(runtime) = runtime else {
            self.finish_stop();
            return Ok(());
        };

        info!(pending = self.table.len(), "Stopping request processor");
        // Sends already holding a queue handle keep the pump alive
        let Runtime {
            dispatch_lifetime,
            writer,
            dispatch,
            pump,
        } = runtime;
        dispatch_lifetime.cancel();
        drop(writer);

        let outstanding = self.table.drain_snapshot();
        let drained = tokio::select! {
            biased;
            _ = join_all(outstanding.iter().map(|signal| signal.settled())) => true,
            _ = cancel.cancelled() => false,
        };
        if !drained {
            let remaining = outstanding.iter().filter(|s| !s.is_settled()).count();
            warn!(remaining, "Stop deadline reached before outstanding requests settled");
        }

        let joined = tokio::select! {
            biased;
            joined = async { (dispatch.await, pump.await) } => Some(joined),
            _ = cancel.cancelled() => None,
        };
        match joined {
            Some((Ok(Ok(())), Ok(()))) => debug!("Background tasks released"),
            Some((Ok(Err(err)), _)) => {
                warn!(error = %err, "Dispatch loop had already terminated with a failure")
            }
            Some(_) => warn!("Background task panicked"),
            None => warn!("Stop cancelled before background tasks exited, detaching"),
        }

        self.finish_stop();
        info!(stats = ?self.table.stats(), "Request processor stopped");
        Ok(())
    }

    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, MuxError> {
        let deadline = deadline_after(self.request_timeout);
        let id = request.id();
        let writer = self.writer()?;
        let mut slot = self.table.register(id)?;

        let write_cancel = CancellationToken::new();
        let guard = RetractOnDrop {
            table: &self.table,
            id,
            write_cancel: write_cancel.clone(),
            armed: true,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MuxError::Cancelled(id)),
            _ = sleep_until(deadline) => Err(MuxError::Timeout {
                id,
                timeout: self.request_timeout,
            }),
            result = round_trip(&writer, request, &write_cancel, &mut slot) => result,
        };
        guard.disarm();

        let err = match outcome {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        // The write, if still queued or running, is no longer wanted
        write_cancel.cancel();
        if self.table.remove_if_present(&id, retract_reason(&err)) {
            match &err {
                MuxError::Timeout { timeout, .. } => {
                    warn!(request_id = %id, timeout_ms = timeout.as_millis() as u64, "Request timed out")
                }
                MuxError::Cancelled(_) => debug!(request_id = %id, "Request cancelled by caller"),
                other => warn!(request_id = %id, error = %other, "Request failed"),
            }
            return Err(err);
        }

        // Lost the race: the dispatch loop removed the call and is handing
        // over the response right now
        match slot.wait().await {
            Ok(response) => {
                debug!(request_id = %id, "Response arrived as the request gave up");
                Ok(response)
            }
            Err(_) => Err(err),
        }
    }

    fn state(&self) -> ProcessorState {
        self.lifecycle.lock().state
    }

    fn pending_count(&self) -> usize {
        self.table.len()
    }

    fn stats(&self) -> ProcessorStats {
        self.table.stats()
    }
}

impl<T: Transport + ?Sized + 'static> Drop for RequestProcessor<T> {
    fn drop(&mut self) {
        if let Some(runtime) = self.lifecycle.get_mut().runtime.take() {
            runtime.cancel();
        }
    }
}
