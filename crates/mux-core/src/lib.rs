//! # Mux Core
//!
//! Correlation-based request/response multiplexing over one full-duplex
//! transport.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Many tasks share a single channel whose `read` and `write` are each
//! non-reentrant. The processor:
//! - writes requests through one writer task
//! - reads responses in one dispatch loop and routes each by identifier
//! - bounds every round trip with a timeout that cannot leak a pending call
//! - drains outstanding calls on a graceful, deadline-bounded stop
//!
//! ## Guarantees
//!
//! | Property | How |
//! |----------|-----|
//! | Exactly-once resolution | Table removal is the compare-and-set |
//! | Duplicate/late responses ignored | `resolve` returns `false`, nothing surfaces |
//! | No leaked calls | Timeout, cancellation and drop all retract the entry |
//! | Non-reentrant transport | One writer task, one dispatch task |
//!
//! ## Module Structure
//!
//! ```text
//! mux-core/
//! ├── domain/          # Request, Response, PendingCallTable, errors, invariants
//! ├── ports/           # RequestProcessorApi (inbound) + Transport (outbound)
//! ├── application/     # RequestProcessor, dispatch loop, write pump
//! ├── adapters/        # LoopbackTransport (simulated peer)
//! └── config.rs        # ProcessorConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{LoopbackConfig, LoopbackStats, LoopbackTransport};
pub use application::RequestProcessor;
pub use config::ProcessorConfig;
pub use domain::{
    MuxError, TransportError,
    Request, RequestId, Response, ProcessorState,
    PendingCallTable, PendingSlot, ProcessorStats, RetractReason, SettledSignal,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_WRITE_QUEUE_CAPACITY,
};
pub use ports::{MockTransport, ReplyMode, RequestProcessorApi, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
