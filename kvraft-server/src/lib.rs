//! Replicated key-value store on top of OpenRaft.
//!
//! Every node runs the same deterministic state machine. Writes are appended
//! to the Raft log and applied on every replica in log order; reads are served
//! by the leader after it has confirmed leadership and caught up to the read
//! index.
//!
//! # Architecture
//!
//! ```text
//!   kv client ──gRPC──▶ KvService ──submit──▶ RaftEngine ──▶ openraft::Raft
//!                          │                                   │
//!                          │ NotLeader / Timeout / Fatal        │ apply (log order)
//!                          ▼                                   ▼
//!                     tonic::Status              ReplicatedStateMachine
//!                                                              │
//!                                                              ▼
//!                                                KeyValueStore (sessions + table)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use kvraft_server::{KvNode, NodeConfig};
//!
//! let config = NodeConfig::builder()
//!     .node_id(1)
//!     .listen_addr("127.0.0.1:7001")
//!     .data_dir("data/1")
//!     .build()?;
//!
//! let node = KvNode::start(config).await?;
//! node.bootstrap(members).await?;
//! ```

pub mod config;
pub mod error;
pub mod halt;
pub mod network;
pub mod node;
pub mod operation;
pub mod raft;
pub mod service;
pub mod state;
pub mod types;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult, StoreError, SubmitError};
pub use halt::Halt;
pub use node::KvNode;
pub use operation::{Operation, OperationKind};
pub use service::{ConsensusEngine, KvService, RaftEngine, SUBMIT_TIMEOUT};
pub use state::{KeyValueStore, StateMachine, SNAPSHOT_THRESHOLD};
pub use types::TypeConfig;
