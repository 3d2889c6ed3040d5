//! Cluster membership parsing.
//!
//! Members are given on the command line as `ID:ADDRESS`, e.g.
//! `1:127.0.0.1:7001`. Only the first colon separates the ID, so addresses
//! keep their port.

use crate::NodeId;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from parsing a member list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MembershipError {
    /// The entry has no `:` separating ID and address.
    #[error("invalid cluster member {0:?}: expected ID:ADDRESS")]
    MissingSeparator(String),

    /// The ID part is not a number.
    #[error("invalid node ID in cluster member {0:?}")]
    InvalidId(String),

    /// The address part is empty.
    #[error("empty address in cluster member {0:?}")]
    EmptyAddress(String),

    /// The same ID appears twice.
    #[error("node {0} listed more than once")]
    Duplicate(NodeId),
}

/// Parse `ID:ADDRESS` entries into a membership map.
pub fn parse_cluster<S: AsRef<str>>(
    members: &[S],
) -> Result<BTreeMap<NodeId, String>, MembershipError> {
    let mut configuration = BTreeMap::new();

    for member in members {
        let member = member.as_ref();
        let (id, address) = member
            .split_once(':')
            .ok_or_else(|| MembershipError::MissingSeparator(member.to_string()))?;

        let id: NodeId = id
            .trim()
            .parse()
            .map_err(|_| MembershipError::InvalidId(member.to_string()))?;

        let address = address.trim();
        if address.is_empty() {
            return Err(MembershipError::EmptyAddress(member.to_string()));
        }

        if configuration.insert(id, address.to_string()).is_some() {
            return Err(MembershipError::Duplicate(id));
        }
    }

    Ok(configuration)
}
