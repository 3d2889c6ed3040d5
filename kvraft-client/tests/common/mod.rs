//! Cluster harness for client tests.

use kvraft_server::{KvNode, NodeConfig};
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Get a free local port for testing.
pub fn get_test_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to allocate port")
}

/// A bootstrapped cluster of in-process nodes.
#[allow(dead_code)]
pub struct TestCluster {
    _temp_dirs: Vec<TempDir>,
    /// Running nodes; `None` once stopped.
    pub nodes: Vec<Option<KvNode>>,
    /// Node ID to address.
    pub members: BTreeMap<u64, String>,
}

#[allow(dead_code)]
impl TestCluster {
    /// Start `node_count` nodes and bootstrap them from node 1.
    pub async fn new(node_count: usize) -> Self {
        let mut temp_dirs = Vec::with_capacity(node_count);
        let mut nodes = Vec::with_capacity(node_count);
        let mut members = BTreeMap::new();

        for i in 0..node_count {
            let node_id = i as u64 + 1;
            let addr = format!("127.0.0.1:{}", get_test_port());
            let temp_dir = TempDir::new().expect("Failed to create temp dir");

            let config = NodeConfig::builder()
                .node_id(node_id)
                .listen_addr(addr.clone())
                .data_dir(temp_dir.path())
                .build()
                .expect("Invalid config");
            let node = KvNode::start(config).await.expect("Failed to start node");

            members.insert(node_id, addr);
            temp_dirs.push(temp_dir);
            nodes.push(Some(node));
        }

        let cluster = Self {
            _temp_dirs: temp_dirs,
            nodes,
            members,
        };
        cluster
            .node(1)
            .bootstrap(cluster.members.clone())
            .await
            .expect("Failed to bootstrap cluster");
        cluster
    }

    /// Running node `id`.
    pub fn node(&self, id: u64) -> &KvNode {
        self.nodes[(id - 1) as usize]
            .as_ref()
            .expect("Node is stopped")
    }

    /// Wait until some running node reports a leader.
    pub async fn wait_for_leader(&self, timeout_ms: u64) -> Option<u64> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            for node in self.nodes.iter().flatten() {
                if let Some(leader) = node.leader().await {
                    return Some(leader);
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        None
    }

    /// Stop node `id`.
    pub async fn stop(&mut self, id: u64) {
        if let Some(mut node) = self.nodes[(id - 1) as usize].take() {
            let _ = node.shutdown().await;
        }
    }

    /// Shutdown all nodes.
    pub async fn shutdown(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            let _ = node.shutdown().await;
        }
    }
}
