//! Leader-affinity client.

use crate::error::{ClientError, Result};
use crate::node::{KeyValueNode, Method};
use kvraft_core::envelope;
use kvraft_core::proto::key_value_client::KeyValueClient;
use kvraft_core::proto::Request;
use kvraft_core::{ClientId, NodeId};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tonic::transport::{Channel, Endpoint};

/// Bound on a single RPC to one member.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// Client of the replicated key-value store.
///
/// Every operation takes `&mut self`: one client has one owner. Tasks that
/// need to issue operations concurrently should create a client each.
pub struct Client<N = KeyValueClient<Channel>> {
    id: ClientId,
    sequence_number: u64,
    leader_id: Option<NodeId>,
    nodes: BTreeMap<NodeId, N>,
}

impl Client {
    /// Create a client for `members` (node ID to `host:port`).
    ///
    /// Channels connect lazily, so this does no I/O, but it must be called
    /// from within a Tokio runtime.
    pub fn connect(members: &BTreeMap<NodeId, String>) -> Result<Self> {
        Self::connect_with_timeout(members, DEFAULT_RPC_TIMEOUT)
    }

    /// Like [`connect`](Self::connect), bounding each RPC by `rpc_timeout`.
    pub fn connect_with_timeout(
        members: &BTreeMap<NodeId, String>,
        rpc_timeout: Duration,
    ) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for (&id, addr) in members {
            let endpoint = Endpoint::from_shared(format!("http://{}", addr))
                .map_err(|e| ClientError::InvalidAddress(format!("{}: {}", addr, e)))?
                .timeout(rpc_timeout);
            nodes.insert(id, KeyValueClient::new(endpoint.connect_lazy()));
        }
        Self::with_nodes(nodes)
    }
}

impl<N: KeyValueNode> Client<N> {
    /// Create a client over already constructed member handles.
    pub fn with_nodes(nodes: BTreeMap<NodeId, N>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ClientError::EmptyCluster);
        }

        let id = uuid::Uuid::new_v4().as_u64_pair().0;
        tracing::debug!(client = id, members = nodes.len(), "client created");

        Ok(Self {
            id,
            sequence_number: 0,
            leader_id: None,
            nodes,
        })
    }

    /// This client's identifier.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Sequence number the next operation will carry.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Member that last accepted an operation.
    pub fn leader_id(&self) -> Option<NodeId> {
        self.leader_id
    }

    /// Read the value of `key`; a missing key reads as the empty string.
    pub async fn get(&mut self, key: &str, timeout: Duration) -> Result<String> {
        let request = envelope::request(key, "", self.id, self.sequence_number);
        self.submit_operation(request, timeout, Method::Get).await
    }

    /// Set `key` to `value` and return the stored value.
    ///
    /// On [`ClientError::Timeout`] the write may or may not have been applied.
    pub async fn put(&mut self, key: &str, value: &str, timeout: Duration) -> Result<String> {
        let request = envelope::request(key, value, self.id, self.sequence_number);
        self.submit_operation(request, timeout, Method::Put).await
    }

    async fn submit_operation(
        &mut self,
        request: Request,
        timeout: Duration,
        method: Method,
    ) -> Result<String> {
        let result = self.send_until(request, timeout, method).await;
        self.sequence_number += 1;
        result
    }

    async fn send_until(
        &mut self,
        request: Request,
        timeout: Duration,
        method: Method,
    ) -> Result<String> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if let Some(leader) = self.leader_id {
                if let Some(node) = self.nodes.get_mut(&leader) {
                    match node.call(method, request.clone()).await {
                        Ok(response) => return Ok(response.value),
                        Err(status) => {
                            tracing::debug!(leader, %method, code = ?status.code(), "cached leader failed");
                        }
                    }
                }
                self.leader_id = None;
            }

            for (&id, node) in self.nodes.iter_mut() {
                match node.call(method, request.clone()).await {
                    Ok(response) => {
                        tracing::debug!(node = id, %method, "found leader");
                        self.leader_id = Some(id);
                        return Ok(response.value);
                    }
                    Err(status) => {
                        tracing::trace!(node = id, %method, code = ?status.code(), "member rejected operation");
                    }
                }
            }

            tokio::task::yield_now().await;
        }

        tracing::warn!(
            client = self.id,
            sequence_number = request.sequence_number,
            %method,
            ?timeout,
            "operation timed out"
        );
        Err(ClientError::Timeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CallFuture;
    use kvraft_core::proto::Response;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tonic::Status;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Role {
        Leader,
        Follower,
        Down,
    }

    #[derive(Clone)]
    struct MockNode {
        role: Arc<Mutex<Role>>,
        calls: Arc<Mutex<Vec<(Method, Request)>>>,
    }

    impl MockNode {
        fn new(role: Role) -> Self {
            Self {
                role: Arc::new(Mutex::new(role)),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn set_role(&self, role: Role) {
            *self.role.lock() = role;
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl KeyValueNode for MockNode {
        fn call(&mut self, method: Method, request: Request) -> CallFuture<'_> {
            self.calls.lock().push((method, request.clone()));
            let role = *self.role.lock();
            Box::pin(async move {
                match role {
                    Role::Leader => Ok(Response {
                        value: format!("{}={}", request.key, request.value),
                    }),
                    Role::Follower => Err(Status::failed_precondition("not leader")),
                    Role::Down => Err(Status::unavailable("connection refused")),
                }
            })
        }
    }

    fn client(roles: &[Role]) -> (Client<MockNode>, Vec<MockNode>) {
        let mocks: Vec<MockNode> = roles.iter().map(|r| MockNode::new(*r)).collect();
        let nodes = mocks
            .iter()
            .enumerate()
            .map(|(i, m)| (i as NodeId + 1, m.clone()))
            .collect();
        (Client::with_nodes(nodes).unwrap(), mocks)
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_sweep_finds_and_caches_leader() {
        let (mut client, mocks) = client(&[Role::Follower, Role::Down, Role::Leader]);

        let value = client.put("a", "1", TIMEOUT).await.unwrap();
        assert_eq!(value, "a=1");
        assert_eq!(client.leader_id(), Some(3));
        assert_eq!(mocks[0].call_count(), 1);
        assert_eq!(mocks[1].call_count(), 1);

        // Cached leader is tried first; the others are not contacted.
        client.get("a", TIMEOUT).await.unwrap();
        assert_eq!(mocks[0].call_count(), 1);
        assert_eq!(mocks[1].call_count(), 1);
        assert_eq!(mocks[2].call_count(), 2);
    }

    #[tokio::test]
    async fn test_sweep_is_in_ascending_id_order() {
        let (mut client, mocks) = client(&[Role::Leader, Role::Leader, Role::Leader]);

        client.put("k", "v", TIMEOUT).await.unwrap();
        assert_eq!(client.leader_id(), Some(1));
        assert_eq!(mocks[1].call_count(), 0);
        assert_eq!(mocks[2].call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_leader_clears_hint() {
        let (mut client, mocks) = client(&[Role::Leader, Role::Follower, Role::Follower]);

        client.put("k", "v", TIMEOUT).await.unwrap();
        assert_eq!(client.leader_id(), Some(1));

        mocks[0].set_role(Role::Down);
        mocks[1].set_role(Role::Leader);

        client.put("k", "w", TIMEOUT).await.unwrap();
        assert_eq!(client.leader_id(), Some(2));
        // Once as cached leader, once in the sweep.
        assert_eq!(mocks[0].call_count(), 3);
    }

    #[tokio::test]
    async fn test_timeout_when_no_leader() {
        let (mut client, mocks) = client(&[Role::Follower, Role::Down]);

        let err = client
            .put("k", "v", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert_eq!(client.leader_id(), None);
        assert_eq!(client.sequence_number(), 1);
        assert!(mocks[0].call_count() >= 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_sends_nothing() {
        let (mut client, mocks) = client(&[Role::Leader]);

        let err = client.get("k", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert_eq!(mocks[0].call_count(), 0);
        assert_eq!(client.sequence_number(), 1);
    }

    #[tokio::test]
    async fn test_envelope_carries_identity_and_sequence() {
        let (mut client, mocks) = client(&[Role::Follower, Role::Leader]);

        client.put("k", "v", TIMEOUT).await.unwrap();
        client.get("k", TIMEOUT).await.unwrap();
        assert_eq!(client.sequence_number(), 2);

        let calls = mocks[1].calls.lock().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, Method::Put);
        assert_eq!(calls[0].1.sequence_number, 0);
        assert_eq!(calls[0].1.value, "v");
        assert_eq!(calls[1].0, Method::Get);
        assert_eq!(calls[1].1.sequence_number, 1);
        assert_eq!(calls[1].1.value, "");
        assert!(calls.iter().all(|(_, r)| r.client == client.id()));

        // The rejected attempt on node 1 carried the same envelope.
        let rejected = mocks[0].calls.lock().clone();
        assert_eq!(rejected[0].1, calls[0].1);
    }

    #[test]
    fn test_empty_cluster_rejected() {
        let result = Client::<MockNode>::with_nodes(BTreeMap::new());
        assert!(matches!(result, Err(ClientError::EmptyCluster)));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_address() {
        let members: BTreeMap<NodeId, String> = [(1, "bad address\n".to_string())].into();
        assert!(matches!(
            Client::connect(&members),
            Err(ClientError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let members: BTreeMap<NodeId, String> = [(1, "127.0.0.1:1".to_string())].into();
        let client = Client::connect(&members).unwrap();
        assert_eq!(client.sequence_number(), 0);
        assert_eq!(client.leader_id(), None);
    }
}
