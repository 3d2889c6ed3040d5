//! Node configuration.

use kvraft_core::NodeId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a kvraft node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's ID in the cluster. Must be non-zero.
    pub node_id: NodeId,

    /// Address serving both the key-value API and Raft RPC (e.g. "127.0.0.1:7001").
    pub listen_addr: String,

    /// Directory holding the Raft log and snapshots.
    pub data_dir: PathBuf,

    /// Raft timing configuration.
    pub raft: RaftTiming,
}

/// Raft timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftTiming {
    /// Election timeout range (min, max) in milliseconds.
    pub election_timeout_ms: (u64, u64),

    /// Leader heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Maximum entries per AppendEntries RPC.
    pub max_entries_per_append: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            listen_addr: "127.0.0.1:7001".to_string(),
            data_dir: PathBuf::from("data"),
            raft: RaftTiming::default(),
        }
    }
}

impl Default for RaftTiming {
    fn default() -> Self {
        Self {
            election_timeout_ms: (150, 300),
            heartbeat_interval_ms: 50,
            max_entries_per_append: 300,
        }
    }
}

impl NodeConfig {
    /// Create a new configuration builder.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// Directory of the Raft log store.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("raft")
    }

    /// Directory of persisted snapshots.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshot")
    }

    /// OpenRaft settings for this node.
    ///
    /// The built-in snapshot policy is off; the node asks the state machine
    /// instead.
    pub fn raft_config(&self) -> Result<openraft::Config, String> {
        let config = openraft::Config {
            cluster_name: "kvraft".to_string(),
            election_timeout_min: self.raft.election_timeout_ms.0,
            election_timeout_max: self.raft.election_timeout_ms.1,
            heartbeat_interval: self.raft.heartbeat_interval_ms,
            max_payload_entries: self.raft.max_entries_per_append,
            snapshot_policy: openraft::SnapshotPolicy::Never,
            ..Default::default()
        };
        config.validate().map_err(|e| e.to_string())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_id == 0 {
            return Err("node_id must be > 0".to_string());
        }

        if self.listen_addr.is_empty() {
            return Err("listen_addr is required".to_string());
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir is required".to_string());
        }

        let (min_election, max_election) = self.raft.election_timeout_ms;
        if min_election >= max_election {
            return Err(format!(
                "election timeout range is empty: {}..{}",
                min_election, max_election
            ));
        }

        if self.raft.heartbeat_interval_ms >= min_election / 2 {
            return Err(format!(
                "heartbeat_interval_ms ({}) should be << election_timeout_ms ({})",
                self.raft.heartbeat_interval_ms, min_election
            ));
        }

        if self.raft.max_entries_per_append == 0 {
            return Err("max_entries_per_append must be > 0".to_string());
        }

        Ok(())
    }
}

/// Builder for NodeConfig.
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    /// Set the node ID.
    pub fn node_id(mut self, id: NodeId) -> Self {
        self.config.node_id = id;
        self
    }

    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set election timeout range in milliseconds.
    pub fn election_timeout_ms(mut self, min: u64, max: u64) -> Self {
        self.config.raft.election_timeout_ms = (min, max);
        self
    }

    /// Set heartbeat interval in milliseconds.
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.raft.heartbeat_interval_ms = ms;
        self
    }

    /// Set the maximum number of entries per AppendEntries RPC.
    pub fn max_entries_per_append(mut self, entries: u64) -> Self {
        self.config.raft.max_entries_per_append = entries;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<NodeConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_are_valid() {
        let config = NodeConfig::builder()
            .node_id(3)
            .listen_addr("127.0.0.1:7003")
            .data_dir("/tmp/kv3")
            .build()
            .expect("valid config");

        assert_eq!(config.node_id, 3);
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/kv3/raft"));
        assert_eq!(config.snapshot_dir(), PathBuf::from("/tmp/kv3/snapshot"));

        let raft = config.raft_config().expect("valid raft config");
        assert_eq!(raft.election_timeout_min, 150);
        assert_eq!(raft.election_timeout_max, 300);
        assert_eq!(raft.heartbeat_interval, 50);
        assert_eq!(raft.max_payload_entries, 300);
        assert!(matches!(raft.snapshot_policy, openraft::SnapshotPolicy::Never));
    }

    #[test]
    fn test_zero_node_id_rejected() {
        let err = NodeConfig::builder().node_id(0).build().unwrap_err();
        assert!(err.contains("node_id"));
    }

    #[test]
    fn test_heartbeat_must_be_below_election_timeout() {
        let err = NodeConfig::builder()
            .election_timeout_ms(100, 200)
            .heartbeat_interval_ms(80)
            .build()
            .unwrap_err();
        assert!(err.contains("heartbeat_interval_ms"));
    }

    #[test]
    fn test_empty_election_range_rejected() {
        let err = NodeConfig::builder()
            .election_timeout_ms(300, 300)
            .build()
            .unwrap_err();
        assert!(err.contains("election timeout"));
    }
}
