//! # Domain Invariants
//!
//! Rules that must hold for a processor to be constructed or operated.

use super::entities::ProcessorState;
use super::errors::MuxError;
use std::time::Duration;

/// Default round-trip timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the outbound write queue.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;

/// Invariant: the per-request timeout is strictly positive.
pub fn invariant_positive_timeout(timeout: Duration) -> Result<(), MuxError> {
    if timeout.is_zero() {
        return Err(MuxError::InvalidConfig(
            "request timeout must be strictly positive".to_string(),
        ));
    }
    Ok(())
}

/// Invariant: the write queue can hold at least one request.
pub fn invariant_write_queue_capacity(capacity: usize) -> Result<(), MuxError> {
    if capacity == 0 {
        return Err(MuxError::InvalidConfig(
            "write queue capacity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Invariant: a lifecycle transition starts from the expected state.
pub fn invariant_state(
    actual: ProcessorState,
    expected: ProcessorState,
) -> Result<(), MuxError> {
    if actual != expected {
        return Err(MuxError::InvalidState { expected, actual });
    }
    Ok(())
}
