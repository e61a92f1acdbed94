//! # Application Layer
//!
//! The request processor and the two background tasks it owns.

pub(crate) mod dispatch;
pub mod service;
pub(crate) mod writer;

pub use service::RequestProcessor;
