//! Consensus engine contract and its OpenRaft implementation.

use crate::error::SubmitError;
use crate::operation::{Operation, OperationKind};
use crate::state::StateMachine;
use crate::types::{CheckIsLeaderError, ClientWriteError, KvRaft, RaftError};
use kvraft_core::proto::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for submission futures.
pub type SubmitFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, SubmitError>> + Send + 'a>>;

/// What the router needs from the consensus engine.
pub trait ConsensusEngine: Send + Sync + 'static {
    /// Submit an operation and wait at most `deadline` for its response.
    ///
    /// # Errors
    ///
    /// - `NotLeader` if this node cannot order the operation
    /// - `Timeout` if the deadline elapsed or no quorum answered
    /// - `Fatal` for anything that leaves the node unusable
    fn submit(&self, operation: Operation, deadline: Duration) -> SubmitFuture<'_>;
}

/// [`ConsensusEngine`] backed by an OpenRaft instance.
///
/// Replicated operations go through `client_write`. Read-only operations are
/// applied to the local state machine once `ensure_linearizable` has confirmed
/// leadership and the state machine has caught up to the read index.
///
/// Reads still pass through the session table, but only on the leader. If a
/// client's read with sequence number N+1 is applied before its write N
/// commits, the leader replays the read's result for the write and skips it,
/// while followers apply it. The replicas then disagree on that key. A client
/// whose write timed out while still in flight, followed by a read, is enough
/// to hit this.
#[derive(Clone)]
pub struct RaftEngine {
    raft: Arc<KvRaft>,
    fsm: Arc<dyn StateMachine>,
}

impl RaftEngine {
    /// Create an engine over `raft`, reading from `fsm` on the leader.
    pub fn new(raft: Arc<KvRaft>, fsm: Arc<dyn StateMachine>) -> Self {
        Self { raft, fsm }
    }

    async fn execute(&self, operation: Operation) -> Result<Response, SubmitError> {
        match operation.kind {
            OperationKind::Replicated => self
                .raft
                .client_write(operation)
                .await
                .map(|written| written.data)
                .map_err(write_error),
            OperationKind::LinearizableReadOnly => {
                self.raft.ensure_linearizable().await.map_err(read_error)?;
                self.fsm
                    .apply(&operation)
                    .map_err(|e| SubmitError::Fatal(e.to_string()))
            }
        }
    }
}

impl ConsensusEngine for RaftEngine {
    fn submit(&self, operation: Operation, deadline: Duration) -> SubmitFuture<'_> {
        Box::pin(async move {
            match tokio::time::timeout(deadline, self.execute(operation)).await {
                Ok(result) => result,
                Err(_) => Err(SubmitError::Timeout),
            }
        })
    }
}

fn write_error(err: RaftError<ClientWriteError>) -> SubmitError {
    match err {
        RaftError::APIError(ClientWriteError::ForwardToLeader(forward)) => SubmitError::NotLeader {
            leader: forward.leader_id,
        },
        other => SubmitError::Fatal(other.to_string()),
    }
}

fn read_error(err: RaftError<CheckIsLeaderError>) -> SubmitError {
    match err {
        RaftError::APIError(CheckIsLeaderError::ForwardToLeader(forward)) => {
            SubmitError::NotLeader {
                leader: forward.leader_id,
            }
        }
        RaftError::APIError(CheckIsLeaderError::QuorumNotEnough(_)) => SubmitError::Timeout,
        other => SubmitError::Fatal(other.to_string()),
    }
}
