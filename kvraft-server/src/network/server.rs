//! gRPC server for handling Raft RPC requests.

use crate::types::{KvRaft, TypeConfig};
use kvraft_core::proto::raft_service_server::RaftService;
use kvraft_core::proto::RaftMessage;
use kvraft_core::NodeId;
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// gRPC server implementation for Raft RPC.
pub struct RaftRpcServer {
    raft: Arc<KvRaft>,
}

impl RaftRpcServer {
    /// Create a new Raft RPC server.
    pub fn new(raft: Arc<KvRaft>) -> Self {
        Self { raft }
    }
}

fn decode<T: DeserializeOwned>(request: Request<RaftMessage>) -> Result<T, Status> {
    serde_json::from_slice(&request.into_inner().data)
        .map_err(|e| Status::invalid_argument(e.to_string()))
}

fn encode<T: Serialize>(message: &T) -> Result<Response<RaftMessage>, Status> {
    let data = serde_json::to_vec(message).map_err(|e| Status::internal(e.to_string()))?;
    Ok(Response::new(RaftMessage { data }))
}

#[tonic::async_trait]
impl RaftService for RaftRpcServer {
    async fn append_entries(
        &self,
        request: Request<RaftMessage>,
    ) -> Result<Response<RaftMessage>, Status> {
        let req: AppendEntriesRequest<TypeConfig> = decode(request)?;
        let resp = self
            .raft
            .append_entries(req)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        encode(&resp)
    }

    async fn request_vote(
        &self,
        request: Request<RaftMessage>,
    ) -> Result<Response<RaftMessage>, Status> {
        let req: VoteRequest<NodeId> = decode(request)?;
        let resp = self
            .raft
            .vote(req)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        encode(&resp)
    }

    async fn install_snapshot(
        &self,
        request: Request<RaftMessage>,
    ) -> Result<Response<RaftMessage>, Status> {
        let req: InstallSnapshotRequest<TypeConfig> = decode(request)?;
        let resp = self
            .raft
            .install_snapshot(req)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        encode(&resp)
    }
}
