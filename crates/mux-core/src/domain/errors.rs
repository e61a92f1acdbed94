//! # Domain Errors
//!
//! Error types for the request processor and its transport port.

use super::entities::{ProcessorState, RequestId};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`Transport`](crate::ports::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The operation observed its cancellation token.
    #[error("Transport operation cancelled")]
    Cancelled,

    /// The underlying channel is closed.
    #[error("Transport closed")]
    Closed,

    /// `read` or `write` was entered while another call of the same kind was
    /// still running.
    #[error("Concurrent {0} on a non-reentrant transport")]
    ConcurrentUse(&'static str),

    /// Any other I/O level failure.
    #[error("Transport failure: {0}")]
    Failed(String),
}

impl TransportError {
    /// Whether this error only reports cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Request processor error types.
#[derive(Debug, Error)]
pub enum MuxError {
    /// A call with this identifier is already outstanding.
    #[error("Duplicate request identifier: {0}")]
    DuplicateIdentifier(RequestId),

    /// No response was observed within the configured window.
    #[error("Request {id} timed out after {timeout:?}")]
    Timeout {
        /// Request that timed out
        id: RequestId,
        /// Configured round-trip timeout
        timeout: Duration,
    },

    /// The caller's own cancellation fired before resolution.
    #[error("Request {0} cancelled by caller")]
    Cancelled(RequestId),

    /// `send` called before `start` or after `stop`.
    #[error("Processor not running")]
    NotRunning,

    /// Lifecycle operation invoked from the wrong state.
    #[error("Invalid processor state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires
        expected: ProcessorState,
        /// State the processor was in
        actual: ProcessorState,
    },

    /// A lifecycle operation observed its cancellation before completing.
    #[error("Lifecycle operation {0} interrupted by cancellation")]
    Interrupted(&'static str),

    /// Rejected configuration at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport failure not attributable to cancellation.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl MuxError {
    /// Whether this error is the timeout outcome.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error is the caller-cancellation outcome.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
