//! Consensus operations.
//!
//! An [`Operation`] is what the router hands to the consensus engine: an
//! encoded request envelope plus how it must be ordered. Replicated operations
//! become the payload of Raft log entries; read-only operations never enter the
//! log and are applied on the leader after a linearizability check.

use kvraft_core::envelope;
use kvraft_core::proto::Request;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an operation is ordered by the consensus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Appended to the log and applied on every replica.
    Replicated,
    /// Applied on the leader only, after confirming leadership.
    LinearizableReadOnly,
}

/// An encoded request envelope tagged with its ordering kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Protobuf-encoded [`Request`].
    pub payload: Vec<u8>,
    /// Ordering kind.
    pub kind: OperationKind,
}

impl Operation {
    /// Wrap an already encoded payload.
    pub fn new(payload: Vec<u8>, kind: OperationKind) -> Self {
        Self { payload, kind }
    }

    /// Encode a request envelope into an operation.
    pub fn from_request(request: &Request, kind: OperationKind) -> Self {
        Self::new(envelope::encode_request(request), kind)
    }

    /// Encode a write.
    pub fn replicated(request: &Request) -> Self {
        Self::from_request(request, OperationKind::Replicated)
    }

    /// Encode a read.
    pub fn read_only(request: &Request) -> Self {
        Self::from_request(request, OperationKind::LinearizableReadOnly)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Replicated => f.write_str("replicated"),
            OperationKind::LinearizableReadOnly => f.write_str("read-only"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} bytes)", self.kind, self.payload.len())
    }
}
