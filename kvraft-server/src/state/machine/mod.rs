//! Key-value state machine with exactly-once sessions.
//!
//! ## Module Structure
//!
//! - `tables`: the key-value and session tables, which double as the snapshot format
//!
//! Everything here is synchronous. The OpenRaft glue in `crate::raft` calls
//! into [`StateMachine`] from its own tasks.

mod tables;

pub use tables::{KvTables, Session};

use crate::error::StoreError;
use crate::operation::{Operation, OperationKind};
use kvraft_core::proto::Response;
use kvraft_core::{envelope, ClientId};
use parking_lot::Mutex;
use std::io::{Read, Write};

/// Number of applied entries after which a snapshot is requested.
pub const SNAPSHOT_THRESHOLD: u64 = 1000;

/// Contract between the consensus engine and the replicated state.
///
/// `apply`, `snapshot` and `restore` are mutually exclusive.
pub trait StateMachine: Send + Sync {
    /// Apply one operation and produce its response.
    ///
    /// A payload that does not decode is a [`StoreError::CorruptOperation`].
    fn apply(&self, operation: &Operation) -> Result<Response, StoreError>;

    /// Write the complete state to `sink`.
    fn snapshot(&self, sink: &mut dyn Write) -> Result<(), StoreError>;

    /// Replace the complete state with the blob read from `source`.
    ///
    /// On error the current state is left untouched.
    fn restore(&self, source: &mut dyn Read) -> Result<(), StoreError>;

    /// Whether a log of `log_size` entries should be compacted.
    fn need_snapshot(&self, log_size: u64) -> bool;
}

/// The key-value state machine.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    tables: Mutex<KvTables>,
}

impl KeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Local, non-linearizable read of `key`.
    pub fn get(&self, key: &str) -> String {
        self.tables.lock().get(key)
    }

    /// Session recorded for `client`, if any.
    pub fn session(&self, client: ClientId) -> Option<Session> {
        self.tables.lock().session_table.get(&client).cloned()
    }

    /// Number of keys in the key-value table.
    pub fn len(&self) -> usize {
        self.tables.lock().key_value_table.len()
    }

    /// Whether the key-value table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateMachine for KeyValueStore {
    fn apply(&self, operation: &Operation) -> Result<Response, StoreError> {
        let request = envelope::decode_request(&operation.payload)?;
        let mut tables = self.tables.lock();

        if let Some(session) = tables.session_table.get(&request.client) {
            if session.sequence_number >= request.sequence_number {
                tracing::debug!(
                    client = request.client,
                    sequence_number = request.sequence_number,
                    "replaying duplicate request"
                );
                return Ok(envelope::response(session.last_result.clone()));
            }
        }

        let value = match operation.kind {
            OperationKind::Replicated => tables.put(request.key, request.value),
            OperationKind::LinearizableReadOnly => tables.get(&request.key),
        };

        let session = tables.session_table.entry(request.client).or_default();
        session.sequence_number = request.sequence_number;
        session.last_result = value.clone();

        Ok(envelope::response(value))
    }

    fn snapshot(&self, sink: &mut dyn Write) -> Result<(), StoreError> {
        let tables = self.tables.lock();
        serde_json::to_writer(&mut *sink, &*tables)?;
        sink.flush()?;
        Ok(())
    }

    fn restore(&self, source: &mut dyn Read) -> Result<(), StoreError> {
        let mut blob = Vec::new();
        source.read_to_end(&mut blob)?;
        let restored: KvTables = serde_json::from_slice(&blob)?;

        let mut tables = self.tables.lock();
        tracing::info!(
            keys = restored.key_value_table.len(),
            sessions = restored.session_table.len(),
            "restoring state machine from snapshot"
        );
        *tables = restored;
        Ok(())
    }

    fn need_snapshot(&self, log_size: u64) -> bool {
        log_size >= SNAPSHOT_THRESHOLD
    }
}
