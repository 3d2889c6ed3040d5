//! Type definitions for OpenRaft integration.

use crate::operation::Operation;
use kvraft_core::proto::Response;
use kvraft_core::NodeId;
use openraft::BasicNode;
use std::io::Cursor;

openraft::declare_raft_types!(
    /// OpenRaft type configuration for kvraft.
    pub TypeConfig:
        D = Operation,
        R = Response,
);

/// Snapshot payload carried between the engine and the state machine.
pub type SnapshotData = Cursor<Vec<u8>>;

/// Type alias for Raft instance.
pub type KvRaft = openraft::Raft<TypeConfig>;

/// Type alias for log entry.
pub type KvEntry = openraft::Entry<TypeConfig>;

/// Type alias for vote.
pub type KvVote = openraft::Vote<NodeId>;

/// Type alias for log ID.
pub type KvLogId = openraft::LogId<NodeId>;

/// Type alias for stored membership.
pub type KvStoredMembership = openraft::StoredMembership<NodeId, BasicNode>;

/// Type alias for snapshot metadata.
pub type KvSnapshotMeta = openraft::SnapshotMeta<NodeId, BasicNode>;

/// Type alias for snapshot.
pub type KvSnapshot = openraft::storage::Snapshot<TypeConfig>;

/// Type alias for storage error.
pub type KvStorageError = openraft::StorageError<NodeId>;

/// Type alias for engine metrics.
pub type KvMetrics = openraft::RaftMetrics<NodeId, BasicNode>;

/// Type alias for client write errors.
pub type ClientWriteError = openraft::error::ClientWriteError<NodeId, BasicNode>;

/// Type alias for linearizable read errors.
pub type CheckIsLeaderError = openraft::error::CheckIsLeaderError<NodeId, BasicNode>;

/// Type alias for OpenRaft Raft errors.
pub type RaftError<E = openraft::error::Infallible> = openraft::error::RaftError<NodeId, E>;

/// Type alias for OpenRaft RPC errors.
pub type RPCError<E = openraft::error::Infallible> =
    openraft::error::RPCError<NodeId, BasicNode, RaftError<E>>;
