//! # Duplex-Mux Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs       # Scripted peer and processor helpers
//! │   └── integration/      # End-to-end behaviour of the processor
//! │       ├── scenarios.rs  # Timeout, duplicate and leak scenarios
//! │       ├── concurrency.rs# Many callers over one transport
//! │       └── lifecycle.rs  # start / stop / drain
//! └── benches/
//!     └── send_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mux-tests
//!
//! # By category
//! cargo test -p mux-tests integration::lifecycle
//!
//! # Benchmarks
//! cargo bench -p mux-tests
//! ```

pub mod integration;
