//! Network client implementing OpenRaft's RaftNetwork trait.

use crate::types::{RPCError, TypeConfig};
use kvraft_core::proto::raft_service_client::RaftServiceClient;
use kvraft_core::proto::RaftMessage;
use kvraft_core::NodeId;
use openraft::error::{InstallSnapshotError, NetworkError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest,
    InstallSnapshotResponse, VoteRequest, VoteResponse,
};
use openraft::BasicNode;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tonic::transport::{Channel, Endpoint};

/// Factory for connections to other cluster members.
///
/// Channels are created lazily and cached per target, keyed by address so a
/// member that moves gets a fresh channel.
#[derive(Clone, Default)]
pub struct Network {
    channels: Arc<RwLock<HashMap<NodeId, (String, Channel)>>>,
}

impl Network {
    /// Create a new network factory.
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, target: NodeId, addr: &str) -> Result<Channel, tonic::transport::Error> {
        if let Some((cached_addr, channel)) = self.channels.read().get(&target) {
            if cached_addr == addr {
                return Ok(channel.clone());
            }
        }

        let channel = Endpoint::from_shared(format!("http://{}", addr))?.connect_lazy();
        self.channels
            .write()
            .insert(target, (addr.to_string(), channel.clone()));
        Ok(channel)
    }
}

impl RaftNetworkFactory<TypeConfig> for Network {
    type Network = PeerConnection;

    async fn new_client(&mut self, target: NodeId, node: &BasicNode) -> Self::Network {
        PeerConnection {
            target,
            addr: node.addr.clone(),
            network: self.clone(),
        }
    }
}

/// A connection to one cluster member.
pub struct PeerConnection {
    target: NodeId,
    addr: String,
    network: Network,
}

#[derive(Debug, Clone, Copy)]
enum RaftRpc {
    AppendEntries,
    Vote,
    InstallSnapshot,
}

impl PeerConnection {
    async fn send<Req, Resp, E>(
        &self,
        rpc: RaftRpc,
        req: &Req,
        option: &RPCOption,
    ) -> Result<Resp, RPCError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error,
    {
        let channel = self
            .network
            .channel(self.target, &self.addr)
            .map_err(|e| network_error::<E, _>(&e))?;
        let data = serde_json::to_vec(req).map_err(|e| network_error::<E, _>(&e))?;

        let mut request = tonic::Request::new(RaftMessage { data });
        request.set_timeout(option.hard_ttl());

        let mut client = RaftServiceClient::new(channel);
        let reply = match rpc {
            RaftRpc::AppendEntries => client.append_entries(request).await,
            RaftRpc::Vote => client.request_vote(request).await,
            RaftRpc::InstallSnapshot => client.install_snapshot(request).await,
        }
        .map_err(|status| -> RPCError<E> {
            tracing::trace!(target_node = self.target, ?rpc, %status, "raft rpc failed");
            openraft::error::RPCError::Unreachable(Unreachable::new(&status))
        })?;

        serde_json::from_slice(&reply.into_inner().data).map_err(|e| network_error::<E, _>(&e))
    }
}

impl RaftNetwork<TypeConfig> for PeerConnection {
    async fn append_entries(
        &mut self,
        req: AppendEntriesRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError> {
        self.send(RaftRpc::AppendEntries, &req, &option).await
    }

    async fn install_snapshot(
        &mut self,
        req: InstallSnapshotRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<InstallSnapshotResponse<NodeId>, RPCError<InstallSnapshotError>> {
        self.send(RaftRpc::InstallSnapshot, &req, &option).await
    }

    async fn vote(
        &mut self,
        req: VoteRequest<NodeId>,
        option: RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError> {
        self.send(RaftRpc::Vote, &req, &option).await
    }
}

fn network_error<E, S>(err: &S) -> RPCError<E>
where
    E: std::error::Error,
    S: std::error::Error + 'static,
{
    openraft::error::RPCError::Network(NetworkError::new(err))
}
