//! # Outbound Ports
//!
//! The full-duplex transport the processor multiplexes over.

use crate::domain::{Request, Response, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Full-duplex transport - outbound port.
///
/// `read` and `write` may run concurrently with each other but never with
/// themselves. Both must return [`TransportError::Cancelled`] once their
/// token is cancelled. Reconnection and framing are the implementation's
/// concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the next response.
    async fn read(&self, cancel: &CancellationToken) -> Result<Response, TransportError>;

    /// Write one request.
    async fn write(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError>;
}

/// Marks a non-reentrant operation as running; cleared on drop.
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    /// Enter the operation, or report who is already inside.
    pub(crate) fn enter(flag: &'a AtomicBool, op: &'static str) -> Result<Self, TransportError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(TransportError::ConcurrentUse(op));
        }
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Mock Implementation for Testing
// =============================================================================

/// How [`MockTransport`] answers a successful write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyMode {
    /// No automatic response; tests inject responses by hand.
    Silent,
    /// Echo every written request back once.
    Echo,
    /// Echo every written request back twice (faulty peer).
    EchoTwice,
}

/// Scripted transport for tests.
pub struct MockTransport {
    /// Requests that completed a write, in order.
    written: Mutex<Vec<Request>>,
    /// Count of completed writes, for waiters.
    writes: watch::Sender<usize>,
    /// Response queue feeding `read`.
    inbound_tx: mpsc::UnboundedSender<Result<Response, TransportError>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Response, TransportError>>>,
    /// Delay before each write completes.
    write_delay: Mutex<Duration>,
    /// Fail every write after the delay.
    fail_writes: AtomicBool,
    /// Automatic reply behaviour.
    reply_mode: Mutex<ReplyMode>,
    reading: AtomicBool,
    writing: AtomicBool,
    /// Set if `read` or `write` was ever re-entered.
    reentered: AtomicBool,
}

impl MockTransport {
    /// Silent mock: writes succeed immediately, nothing is answered.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reply_mode(ReplyMode::Silent)
    }

    /// Mock that echoes each write back as a response.
    #[must_use]
    pub fn echoing() -> Self {
        Self::with_reply_mode(ReplyMode::Echo)
    }

    /// Mock with the given reply mode.
    #[must_use]
    pub fn with_reply_mode(mode: ReplyMode) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (writes, _) = watch::channel(0);
        Self {
            written: Mutex::new(Vec::new()),
            writes,
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            write_delay: Mutex::new(Duration::ZERO),
            fail_writes: AtomicBool::new(false),
            reply_mode: Mutex::new(mode),
            reading: AtomicBool::new(false),
            writing: AtomicBool::new(false),
            reentered: AtomicBool::new(false),
        }
    }

    /// Queue a response for the next `read`.
    pub fn inject(&self, response: Response) {
        let _ = self.inbound_tx.send(Ok(response));
    }

    /// Make the next `read` fail with `error`.
    pub fn inject_error(&self, error: TransportError) {
        let _ = self.inbound_tx.send(Err(error));
    }

    /// Delay every subsequent write by `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Change how writes are answered.
    pub fn set_reply_mode(&self, mode: ReplyMode) {
        *self.reply_mode.lock() = mode;
    }

    /// Requests written so far.
    #[must_use]
    pub fn written(&self) -> Vec<Request> {
        self.written.lock().clone()
    }

    /// Number of completed writes.
    #[must_use]
    pub fn written_count(&self) -> usize {
        *self.writes.borrow()
    }

    /// Wait until at least `count` writes have completed.
    pub async fn wait_for_writes(&self, count: usize) {
        let mut rx = self.writes.subscribe();
        let _ = rx.wait_for(|written| *written >= count).await;
    }

    /// Whether `read` or `write` was ever called re-entrantly.
    #[must_use]
    pub fn reentrancy_detected(&self) -> bool {
        self.reentered.load(Ordering::Acquire)
    }

    fn enter<'a>(
        &self,
        flag: &'a AtomicBool,
        op: &'static str,
    ) -> Result<InFlight<'a>, TransportError> {
        InFlight::enter(flag, op).inspect_err(|_| self.reentered.store(true, Ordering::Release))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read(&self, cancel: &CancellationToken) -> Result<Response, TransportError> {
        let _in_flight = self.enter(&self.reading, "read")?;
        let mut inbound = self.inbound_rx.lock().await;

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            next = inbound.recv() => next.unwrap_or(Err(TransportError::Closed)),
        }
    }

    async fn write(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let _in_flight = self.enter(&self.writing, "write")?;

        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::Failed("scripted write failure".to_string()));
        }

        self.written.lock().push(request.clone());
        self.writes.send_modify(|written| *written += 1);

        let replies = match *self.reply_mode.lock() {
            ReplyMode::Silent => 0,
            ReplyMode::Echo => 1,
            ReplyMode::EchoTwice => 2,
        };
        for _ in 0..replies {
            self.inject(Response::echo(request));
        }
        Ok(())
    }
}
