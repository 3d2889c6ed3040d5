//! Client-facing key-value service.
//!
//! The router turns each gRPC call into one consensus submission and maps
//! the outcome to a gRPC status. The engine sits behind [`ConsensusEngine`]
//! so the router can run against a scripted engine in tests.

mod engine;
mod router;

pub use engine::{ConsensusEngine, RaftEngine, SubmitFuture};
pub use router::{KvService, SUBMIT_TIMEOUT};
