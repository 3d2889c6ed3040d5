//! OpenRaft storage integration.
//!
//! - [`LogStore`]: segmented on-disk Raft log plus hard state
//! - [`ReplicatedStateMachine`]: drives a [`StateMachine`](crate::StateMachine)
//!   from committed entries and persists its snapshots

mod log_store;
mod state_machine;

pub use log_store::LogStore;
pub use state_machine::{ReplicatedStateMachine, SnapshotStore, StoredSnapshot};
