//! Leader-affinity client for the kvraft key-value store.
//!
//! The client remembers which member last answered successfully and sends
//! there first. When that fails it sweeps every member in ascending node-ID
//! order until one accepts, retrying until the caller's timeout elapses.
//!
//! # Example
//!
//! ```no_run
//! use kvraft_client::Client;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let members = kvraft_core::parse_cluster(&["1:127.0.0.1:7001", "2:127.0.0.1:7002"])?;
//! let mut client = Client::connect(&members)?;
//!
//! client.put("color", "blue", Duration::from_secs(3)).await?;
//! let value = client.get("color", Duration::from_secs(3)).await?;
//! assert_eq!(value, "blue");
//! # Ok(())
//! # }
//! ```
//!
//! # Retries
//!
//! Every call carries a fresh sequence number, and the servers replay the
//! cached result when they see a sequence number again. A call that times out
//! may or may not have taken effect.

mod client;
mod error;
mod node;

pub use client::{Client, DEFAULT_RPC_TIMEOUT};
pub use error::{ClientError, Result};
pub use node::{CallFuture, KeyValueNode, Method};
