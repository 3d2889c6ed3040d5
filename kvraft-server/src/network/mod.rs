//! Raft RPC transport over gRPC.
//!
//! Each OpenRaft message is JSON-encoded into a `RaftMessage` and carried by
//! the `RaftService` defined in `kvraft.proto`.

mod client;
mod server;

pub use client::{Network, PeerConnection};
pub use server::RaftRpcServer;
