//! # Domain Module
//!
//! Core domain types for the request processor.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod pending;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use pending::*;
