//! # Pending-Call Table
//!
//! Maps request identifiers to single-assignment result slots.
//!
//! Flow:
//! 1. `send` calls [`PendingCallTable::register`] and keeps the returned
//!    [`PendingSlot`]
//! 2. The request is written to the transport
//! 3. The dispatch loop reads a response and calls [`PendingCallTable::resolve`]
//! 4. `send` awaits the slot, or retracts it with
//!    [`PendingCallTable::remove_if_present`] on timeout or cancellation
//!
//! Removal from the map is the compare-and-set: whichever path removes the
//! entry first owns the resolution, every other path observes `false`.

use crate::domain::entities::{RequestId, Response};
use crate::domain::errors::MuxError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Why a pending call was retracted without a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetractReason {
    /// Round-trip timeout elapsed.
    Timeout,
    /// Caller cancellation fired.
    Cancelled,
    /// The write to the transport failed.
    TransportFailure,
    /// The `send` future was dropped before it finished.
    Abandoned,
}

/// A call waiting in the table.
struct PendingCall {
    /// Result slot, consumed by `resolve`.
    sender: oneshot::Sender<Response>,
    /// When the call was registered.
    created_at: Instant,
    /// Cancelled once the call leaves the table.
    settled: CancellationToken,
    /// Cancels `settled` when the entry is dropped, whichever path removed it.
    _settle_on_drop: DropGuard,
}

/// Caller side of a registered call.
#[derive(Debug)]
pub struct PendingSlot {
    id: RequestId,
    receiver: oneshot::Receiver<Response>,
}

impl PendingSlot {
    /// Identifier this slot is keyed by.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the dispatch loop to resolve the slot.
    ///
    /// Fails with [`MuxError::NotRunning`] if the entry was discarded without
    /// a response, which only happens when the table itself goes away.
    pub async fn wait(&mut self) -> Result<Response, MuxError> {
        (&mut self.receiver).await.map_err(|_| MuxError::NotRunning)
    }

    /// Take a response that was delivered but not yet observed, without
    /// waiting.
    pub fn try_take(&mut self) -> Option<Response> {
        self.receiver.try_recv().ok()
    }
}

/// Completion signal of one outstanding call, used by shutdown drain.
#[derive(Clone, Debug)]
pub struct SettledSignal {
    id: RequestId,
    token: CancellationToken,
}

impl SettledSignal {
    /// Identifier of the call.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Whether the call has left the table.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the call leaves the table by any path.
    pub async fn settled(&self) {
        self.token.cancelled().await;
    }
}

/// Counters kept by the table.
#[derive(Debug, Default)]
struct PendingStats {
    registered: AtomicU64,
    completed: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    transport_failures: AtomicU64,
    abandoned: AtomicU64,
    dropped_responses: AtomicU64,
}

/// Point-in-time copy of the table counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    /// Calls registered.
    pub registered: u64,
    /// Calls resolved with a response.
    pub completed: u64,
    /// Calls retracted by the round-trip timeout.
    pub timeouts: u64,
    /// Calls retracted by caller cancellation.
    pub cancelled: u64,
    /// Calls retracted after a failed write.
    pub transport_failures: u64,
    /// Calls retracted because the caller dropped the `send` future.
    pub abandoned: u64,
    /// Responses with no matching call (duplicate or late).
    pub dropped_responses: u64,
    /// Calls still in the table.
    pub pending: u64,
}

/// Concurrency-safe table of in-flight calls.
///
/// Every operation is a single map mutation; no lock is held past the call.
pub struct PendingCallTable {
    pending: DashMap<RequestId, PendingCall>,
    stats: PendingStats,
}

impl PendingCallTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// Register a call for `id`.
    ///
    /// Fails with [`MuxError::DuplicateIdentifier`] if `id` is already
    /// outstanding; the existing entry is left untouched.
    pub fn register(&self, id: RequestId) -> Result<PendingSlot, MuxError> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => Err(MuxError::DuplicateIdentifier(id)),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = oneshot::channel();
                let settled = CancellationToken::new();
                vacant.insert(PendingCall {
                    sender,
                    created_at: Instant::now(),
                    _settle_on_drop: settled.clone().drop_guard(),
                    settled,
                });
                self.stats.registered.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, "Registered pending call");
                Ok(PendingSlot { id, receiver })
            }
        }
    }

    /// Resolve the call matching `response`.
    ///
    /// Returns `false` when no call is waiting (duplicate or late delivery)
    /// or its caller is already gone. Both are normal outcomes.
    pub fn resolve(&self, response: Response) -> bool {
        let id = response.id();
        let Some((_, call)) = self.pending.remove(&id) else {
            self.stats.dropped_responses.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %id, "Dropped response with no pending call");
            return false;
        };

        let elapsed = call.created_at.elapsed();
        match call.sender.send(response) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, "Pending call receiver dropped");
                false
            }
        }
    }

    /// Retract the call for `id` without resolving it.
    ///
    /// Returns whether an entry was removed; `false` means another path
    /// already resolved or retracted it, and nothing is counted.
    pub fn remove_if_present(&self, id: &RequestId, reason: RetractReason) -> bool {
        if self.pending.remove(id).is_none() {
            return false;
        }

        let counter = match reason {
            RetractReason::Timeout => &self.stats.timeouts,
            RetractReason::Cancelled => &self.stats.cancelled,
            RetractReason::TransportFailure => &self.stats.transport_failures,
            RetractReason::Abandoned => &self.stats.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %id, reason = ?reason, "Retracted pending call");
        true
    }

    /// Completion signals of every call outstanding right now.
    ///
    /// Calls registered after the snapshot are not included.
    #[must_use]
    pub fn drain_snapshot(&self) -> Vec<SettledSignal> {
        self.pending
            .iter()
            .map(|entry| SettledSignal {
                id: *entry.key(),
                token: entry.value().settled.clone(),
            })
            .collect()
    }

    /// Whether `id` is outstanding.
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of outstanding calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no call is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            registered: self.stats.registered.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            cancelled: self.stats.cancelled.load(Ordering::Relaxed),
            transport_failures: self.stats.transport_failures.load(Ordering::Relaxed),
            abandoned: self.stats.abandoned.load(Ordering::Relaxed),
            dropped_responses: self.stats.dropped_responses.load(Ordering::Relaxed),
            pending: self.pending.len() as u64,
        }
    }
}

impl Default for PendingCallTable {
    fn default() -> Self {
        Self::new()
    }
}
