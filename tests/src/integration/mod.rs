//! # Integration Tests
//!
//! Request processor behaviour over real and scripted transports.

pub mod concurrency;
pub mod scenarios;
