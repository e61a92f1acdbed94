//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound transport port.

mod loopback;

pub use loopback::{LoopbackConfig, LoopbackStats, LoopbackTransport};
