//! # Domain Entities
//!
//! Requests, responses and the processor lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique request identifier.
///
/// Assigned by the caller before submission. The same identifier travels
/// back on the matching [`Response`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Outgoing request.
///
/// The payload is opaque to the processor; encoding belongs to the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    payload: Vec<u8>,
}

impl Request {
    /// Create a request with an explicit identifier.
    #[must_use]
    pub fn new(id: RequestId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Create a request with a fresh identifier and an empty payload.
    #[must_use]
    pub fn fresh() -> Self {
        Self::new(RequestId::new(), Vec::new())
    }

    /// Request identifier.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Opaque payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Incoming response, correlated to a request by identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    id: RequestId,
    payload: Vec<u8>,
}

impl Response {
    /// Create a response for the given request identifier.
    #[must_use]
    pub fn new(id: RequestId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Echo a request back as its own response (used by simulated peers).
    #[must_use]
    pub fn echo(request: &Request) -> Self {
        Self::new(request.id(), request.payload().to_vec())
    }

    /// Identifier of the request this response answers.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Opaque payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Processor lifecycle.
///
/// ```text
/// Created --start()--> Running --stop()--> Stopping --> Stopped
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorState {
    /// Constructed, dispatch loop not spawned yet.
    Created,
    /// Dispatch loop live, `send` accepted.
    Running,
    /// `stop` in progress; new sends rejected.
    Stopping,
    /// Resources released.
    Stopped,
}

impl ProcessorState {
    /// Whether `send` is accepted in this state.
    #[must_use]
    pub fn accepts_requests(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
