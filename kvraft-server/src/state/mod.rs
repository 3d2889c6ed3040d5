//! Replicated state.
//!
//! The state machine receives request envelopes in log order and applies them
//! to the key-value table, deduplicating retries through per-client sessions.
//! All replicas apply the same envelopes in the same order and so hold the
//! same table.

pub mod machine;

pub use machine::{KeyValueStore, Session, StateMachine, SNAPSHOT_THRESHOLD};
