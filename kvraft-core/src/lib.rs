//! Shared wire types for kvraft.
//!
//! This crate holds what both sides of the wire need to agree on:
//!
//! - [`proto`]: the generated gRPC services and the request/response envelopes
//! - [`envelope`]: encoding of request envelopes into consensus payloads
//! - [`membership`]: parsing of `id:address` cluster member lists

pub mod envelope;
pub mod membership;

pub use membership::{parse_cluster, MembershipError};

/// Identifier of a cluster member.
pub type NodeId = u64;

/// Identifier a client picks for itself; keys the server-side session table.
pub type ClientId = u64;

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("kvraft");
}
