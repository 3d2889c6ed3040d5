//! Error types for the kvraft client.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when using the kvraft client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No member accepted the operation before the deadline.
    #[error("Operation failed: timeout of {0:?} elapsed")]
    Timeout(Duration),

    /// A member address could not be turned into an endpoint.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The client was given no members.
    #[error("Cluster has no members")]
    EmptyCluster,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
