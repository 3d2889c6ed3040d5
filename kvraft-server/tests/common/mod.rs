//! Common test utilities for kvraft-server tests.

use kvraft_core::proto::key_value_client::KeyValueClient;
use kvraft_server::{KvNode, NodeConfig};
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tonic::transport::Channel;

/// Get a free local port for testing.
pub fn get_test_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to allocate port")
}

/// Test timings: fast elections keep the suite short.
#[allow(dead_code)]
pub fn test_config(node_id: u64, listen_addr: &str, data_dir: &Path) -> NodeConfig {
    NodeConfig::builder()
        .node_id(node_id)
        .listen_addr(listen_addr)
        .data_dir(data_dir)
        .election_timeout_ms(150, 300)
        .heartbeat_interval_ms(50)
        .build()
        .expect("Invalid config")
}

/// Test context that holds temp directories and nodes.
#[allow(dead_code)]
pub struct TestCluster {
    /// Temp directories for each node (kept alive for the test duration).
    pub temp_dirs: Vec<TempDir>,
    /// Cluster nodes, node `i` has ID `i + 1`.
    pub nodes: Vec<KvNode>,
    /// Node addresses.
    pub addresses: Vec<String>,
}

#[allow(dead_code)]
impl TestCluster {
    /// Start `node_count` nodes and bootstrap them as one cluster.
    pub async fn new(node_count: usize) -> Self {
        let mut temp_dirs = Vec::with_capacity(node_count);
        let mut nodes = Vec::with_capacity(node_count);
        let mut addresses = Vec::with_capacity(node_count);

        for i in 0..node_count {
            let addr = format!("127.0.0.1:{}", get_test_port());
            let temp_dir = TempDir::new().expect("Failed to create temp dir");

            let config = test_config(i as u64 + 1, &addr, temp_dir.path());
            let node = KvNode::start(config).await.expect("Failed to start node");

            addresses.push(addr);
            temp_dirs.push(temp_dir);
            nodes.push(node);
        }

        let cluster = Self {
            temp_dirs,
            nodes,
            addresses,
        };
        cluster.nodes[0]
            .bootstrap(cluster.members())
            .await
            .expect("Failed to bootstrap cluster");
        cluster
    }

    /// Node ID to address for every node.
    pub fn members(&self) -> BTreeMap<u64, String> {
        self.addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| (i as u64 + 1, addr.clone()))
            .collect()
    }

    /// Wait for a leader that every node agrees on.
    pub async fn wait_for_leader(&self, timeout_ms: u64) -> Option<u64> {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            let mut leaders = Vec::with_capacity(self.nodes.len());
            for node in &self.nodes {
                leaders.push(node.leader().await);
            }
            if let Some(Some(leader)) = leaders.first().copied() {
                if leaders.iter().all(|l| *l == Some(leader)) {
                    return Some(leader);
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        None
    }

    /// Index into `nodes` of node `id`.
    pub fn index_of(&self, id: u64) -> usize {
        (id - 1) as usize
    }

    /// Connect a gRPC client to node `id`.
    pub async fn connect(&self, id: u64) -> KeyValueClient<Channel> {
        connect(&self.addresses[self.index_of(id)]).await
    }

    /// Shutdown all nodes.
    pub async fn shutdown(&mut self) {
        for node in &mut self.nodes {
            let _ = node.shutdown().await;
        }
    }
}

/// Connect a gRPC client to `addr`.
#[allow(dead_code)]
pub async fn connect(addr: &str) -> KeyValueClient<Channel> {
    KeyValueClient::connect(format!("http://{}", addr))
        .await
        .expect("Failed to connect")
}

/// Poll `check` until it returns true or `timeout_ms` passes.
#[allow(dead_code)]
pub async fn eventually<F: FnMut() -> bool>(timeout_ms: u64, mut check: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
