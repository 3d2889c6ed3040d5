//! The two tables owned by the state machine.

use kvraft_core::ClientId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last request seen from one client and the value it produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Highest sequence number applied for this client.
    pub sequence_number: u64,
    /// Response value of that request, replayed for duplicates.
    pub last_result: String,
}

/// Key-value table plus session table.
///
/// This is also the snapshot format: one JSON object with both tables.
/// Sessions are never evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvTables {
    /// User data.
    pub key_value_table: HashMap<String, String>,
    /// Client ID to session.
    pub session_table: HashMap<ClientId, Session>,
}

impl KvTables {
    /// Overwrite `key` and return the stored value.
    pub fn put(&mut self, key: String, value: String) -> String {
        self.key_value_table.insert(key, value.clone());
        value
    }

    /// Current value of `key`, or the empty string when absent.
    pub fn get(&self, key: &str) -> String {
        self.key_value_table.get(key).cloned().unwrap_or_default()
    }
}
