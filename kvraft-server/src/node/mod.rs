//! KvNode - runtime of one cluster member.
//!
//! Ties together the log store, the replicated state machine, the Raft
//! instance, the gRPC server and the snapshot policy task.

mod snapshot_policy;

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::halt::Halt;
use crate::network::{Network, RaftRpcServer};
use crate::raft::{LogStore, ReplicatedStateMachine};
use crate::service::{KvService, RaftEngine};
use crate::state::{KeyValueStore, StateMachine};
use crate::types::{KvMetrics, KvRaft, RaftError};
use kvraft_core::proto::key_value_server::KeyValueServer;
use kvraft_core::proto::raft_service_server::RaftServiceServer;
use kvraft_core::NodeId;
use openraft::error::InitializeError;
use openraft::{BasicNode, Raft};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;

/// How long shutdown waits for in-flight calls to finish.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running kvraft node.
///
/// Serves the `KeyValue` and `RaftService` gRPC services on one address until
/// [`shutdown`](Self::shutdown) is called, the node is dropped, or a fatal
/// error halts it.
pub struct KvNode {
    node_id: NodeId,
    addr: SocketAddr,
    raft: Arc<KvRaft>,
    store: Arc<KeyValueStore>,
    engine: RaftEngine,
    halt: Halt,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
    policy: JoinHandle<()>,
}

impl KvNode {
    /// Start a node: open storage, start Raft, serve gRPC.
    ///
    /// A node that has never been bootstrapped and has no peers contacting it
    /// stays idle until [`bootstrap`](Self::bootstrap) is called somewhere.
    pub async fn start(config: NodeConfig) -> NodeResult<Self> {
        config.validate().map_err(NodeError::Config)?;

        let node_id = config.node_id;
        let addr: SocketAddr = config.listen_addr.parse().map_err(|e| {
            NodeError::Config(format!("invalid listen address {}: {}", config.listen_addr, e))
        })?;

        // Bind before anything else starts so an unusable address fails here.
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let incoming = TcpIncoming::from_listener(listener, true, None)
            .map_err(|e| NodeError::Io(std::io::Error::other(e)))?;

        let log_store = LogStore::open(config.log_dir())?;
        let store = Arc::new(KeyValueStore::new());
        let fsm: Arc<dyn StateMachine> = store.clone();
        let state_machine = ReplicatedStateMachine::open(Arc::clone(&fsm), config.snapshot_dir())?;

        let raft_config = Arc::new(config.raft_config().map_err(NodeError::Config)?);

        let raft = Raft::new(
            node_id,
            raft_config,
            Network::new(),
            log_store,
            state_machine,
        )
        .await
        .map_err(|e| NodeError::Raft(format!("failed to create raft: {}", e)))?;
        let raft = Arc::new(raft);

        let halt = Halt::new();
        let engine = RaftEngine::new(Arc::clone(&raft), Arc::clone(&fsm));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let server = tokio::spawn(serve(
            addr,
            incoming,
            Arc::clone(&raft),
            KvService::new(engine.clone(), halt.clone()),
            shutdown_rx,
            halt.clone(),
        ));
        let policy = tokio::spawn(snapshot_policy::run(Arc::clone(&raft), fsm));

        tracing::info!(
            node_id,
            %addr,
            data_dir = %config.data_dir.display(),
            "kvraft node started"
        );

        Ok(Self {
            node_id,
            addr,
            raft,
            store,
            engine,
            halt,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
            policy,
        })
    }

    /// Initialize the cluster with `members` (node ID to address).
    ///
    /// Every member may run this with the same membership; a node that is
    /// already initialized treats it as a no-op.
    pub async fn bootstrap(&self, members: BTreeMap<NodeId, String>) -> NodeResult<()> {
        let nodes: BTreeMap<NodeId, BasicNode> = members
            .into_iter()
            .map(|(id, addr)| (id, BasicNode { addr }))
            .collect();
        let member_ids: Vec<NodeId> = nodes.keys().copied().collect();

        match self.raft.initialize(nodes).await {
            Ok(()) => {
                tracing::info!(node_id = self.node_id, members = ?member_ids, "cluster bootstrapped");
                Ok(())
            }
            Err(RaftError::APIError(InitializeError::NotAllowed(e))) => {
                tracing::info!(node_id = self.node_id, reason = %e, "already initialized, skipping bootstrap");
                Ok(())
            }
            Err(e) => Err(NodeError::Raft(e.to_string())),
        }
    }

    /// Get the current leader's node ID.
    pub async fn leader(&self) -> Option<NodeId> {
        self.raft.current_leader().await
    }

    /// Check if this node is the leader.
    pub async fn is_leader(&self) -> bool {
        self.raft.current_leader().await == Some(self.node_id)
    }

    /// Get this node's ID.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Address serving both gRPC services.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The local state machine, for non-linearizable inspection.
    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    /// The consensus engine the router submits to.
    pub fn engine(&self) -> &RaftEngine {
        &self.engine
    }

    /// Get engine metrics.
    pub fn metrics(&self) -> KvMetrics {
        self.raft.metrics().borrow().clone()
    }

    /// Whether a fatal error has halted this node.
    pub fn is_halted(&self) -> bool {
        self.halt.is_halted()
    }

    /// Wait until a fatal error halts this node.
    pub async fn halted(&self) {
        self.halt.wait().await
    }

    /// Build a snapshot now, regardless of the snapshot policy.
    pub async fn trigger_snapshot(&self) -> NodeResult<()> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| NodeError::Raft(e.to_string()))
    }

    /// Shutdown the node gracefully.
    pub async fn shutdown(&mut self) -> NodeResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut server) = self.server.take() {
            if tokio::time::timeout(SERVER_DRAIN_TIMEOUT, &mut server)
                .await
                .is_err()
            {
                tracing::warn!(node_id = self.node_id, "gRPC server did not drain, aborting");
                server.abort();
            }
        }
        self.policy.abort();

        self.raft
            .shutdown()
            .await
            .map_err(|e| NodeError::Raft(format!("shutdown error: {:?}", e)))?;

        tracing::info!(node_id = self.node_id, "kvraft node shutdown");
        Ok(())
    }
}

impl Drop for KvNode {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.policy.abort();
    }
}

async fn serve(
    addr: SocketAddr,
    incoming: TcpIncoming,
    raft: Arc<KvRaft>,
    kv_service: KvService<RaftEngine>,
    shutdown_rx: oneshot::Receiver<()>,
    halt: Halt,
) {
    let result = Server::builder()
        .add_service(RaftServiceServer::new(RaftRpcServer::new(Arc::clone(&raft))))
        .add_service(KeyValueServer::new(kv_service))
        .serve_with_incoming_shutdown(incoming, async {
            tokio::select! {
                _ = shutdown_rx => {}
                _ = halt.wait() => {}
            }
        })
        .await;

    if let Err(e) = result {
        tracing::error!(%addr, error = %e, "gRPC server failed");
        halt.trigger();
    }

    if halt.is_halted() {
        tracing::warn!(%addr, "node halted, stopping raft");
        if let Err(e) = raft.shutdown().await {
            tracing::error!(error = ?e, "raft shutdown failed");
        }
    }
}
