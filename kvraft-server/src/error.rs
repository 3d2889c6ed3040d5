//! Error types for the server side of kvraft.

use kvraft_core::NodeId;
use thiserror::Error;

/// Result type for node lifecycle operations.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

/// Errors raised by the state machine and its snapshot storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A log entry payload is not a valid request envelope.
    #[error("Corrupt operation: {0}")]
    CorruptOperation(#[from] prost::DecodeError),

    /// Reading or writing snapshot data failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot blob could not be encoded or decoded.
    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Outcome of a failed submission to the consensus engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// This node cannot accept the operation; `leader` is the engine's hint.
    #[error("Not the leader, leader is node {leader:?}")]
    NotLeader {
        /// The current leader if known.
        leader: Option<NodeId>,
    },

    /// The deadline elapsed before the operation completed.
    #[error("Submission timed out")]
    Timeout,

    /// The engine failed in a way that leaves this node unusable.
    #[error("Consensus engine failure: {0}")]
    Fatal(String),
}

/// Errors from starting, bootstrapping or stopping a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Invalid node or Raft configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raft engine error.
    #[error("Raft error: {0}")]
    Raft(String),

    /// State machine or snapshot store error.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
