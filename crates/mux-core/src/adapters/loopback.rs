//! Loopback Transport Adapter
//!
//! Implements the `Transport` port with an in-process simulated peer that
//! answers every written request with an echo response. Latency, duplicate
//! delivery and lost responses are injected at random.

use crate::domain::{Request, Response, TransportError};
use crate::ports::outbound::{InFlight, Transport};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Behaviour of the simulated peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopbackConfig {
    /// Upper bound of the random delay applied to each read and write.
    pub max_latency_ms: u64,
    /// Chance that a request is answered twice.
    pub duplicate_probability: f64,
    /// Chance that a request is never answered.
    pub drop_probability: f64,
    /// Responses the peer buffers before writes block.
    pub queue_capacity: usize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            max_latency_ms: 10,
            duplicate_probability: 0.5,
            drop_probability: 0.0,
            queue_capacity: 10,
        }
    }
}

impl LoopbackConfig {
    /// Well-behaved peer: no latency, no faults.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_latency_ms: 0,
            duplicate_probability: 0.0,
            drop_probability: 0.0,
            queue_capacity: 64,
        }
    }

    fn latency(&self) -> Duration {
        if self.max_latency_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.max_latency_ms))
    }

    /// How many times the next request is answered: 0, 1 or 2.
    fn copies(&self) -> usize {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(chance(self.drop_probability)) {
            0
        } else if rng.gen_bool(chance(self.duplicate_probability)) {
            2
        } else {
            1
        }
    }
}

/// Clamp a configured probability into `[0, 1]`; NaN counts as never.
fn chance(probability: f64) -> f64 {
    if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    }
}

/// Counters kept by the peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopbackStats {
    /// Requests accepted by `write`.
    pub requests: u64,
    /// Responses queued for `read`, duplicates included.
    pub responses: u64,
    /// Extra copies queued.
    pub duplicates: u64,
    /// Requests left unanswered.
    pub dropped: u64,
}

/// In-process simulated peer.
pub struct LoopbackTransport {
    config: LoopbackConfig,
    tx: mpsc::Sender<Response>,
    rx: Mutex<mpsc::Receiver<Response>>,
    reading: AtomicBool,
    writing: AtomicBool,
    requests: AtomicU64,
    responses: AtomicU64,
    duplicates: AtomicU64,
    dropped: AtomicU64,
}

impl LoopbackTransport {
    /// Create a peer with the given behaviour.
    ///
    /// A zero `queue_capacity` is raised to one.
    pub fn new(config: LoopbackConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            config,
            tx,
            rx: Mutex::new(rx),
            reading: AtomicBool::new(false),
            writing: AtomicBool::new(false),
            requests: AtomicU64::new(0),
            responses: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Peer configuration.
    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LoopbackStats {
        LoopbackStats {
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<(), TransportError> {
        let delay = self.config.latency();
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    async fn enqueue(
        &self,
        response: Response,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            sent = self.tx.send(response) => sent.map_err(|_| TransportError::Closed),
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn read(&self, cancel: &CancellationToken) -> Result<Response, TransportError> {
        let _in_flight = InFlight::enter(&self.reading, "read")?;
        self.pause(cancel).await?;

        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            next = rx.recv() => next.ok_or(TransportError::Closed),
        }
    }

    async fn write(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let _in_flight = InFlight::enter(&self.writing, "write")?;
        self.pause(cancel).await?;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let copies = self.config.copies();
        if copies == 0 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(request_id = %request.id(), "Peer dropped request");
            return Ok(());
        }
        for copy in 0..copies {
            self.enqueue(Response::echo(request), cancel).await?;
            self.responses.fetch_add(1, Ordering::Relaxed);
            if copy > 0 {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                trace!(request_id = %request.id(), "Peer answered twice");
            }
        }
        Ok(())
    }
}
