//! Per-member RPC handle.

use kvraft_core::proto::key_value_client::KeyValueClient;
use kvraft_core::proto::{Request, Response};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tonic::transport::Channel;
use tonic::Status;

/// Which `KeyValue` RPC to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Future returned by [`KeyValueNode::call`].
pub type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, Status>> + Send + 'a>>;

/// One cluster member as seen by the client.
pub trait KeyValueNode: Send {
    /// Send `request` to this member.
    fn call(&mut self, method: Method, request: Request) -> CallFuture<'_>;
}

impl KeyValueNode for KeyValueClient<Channel> {
    fn call(&mut self, method: Method, request: Request) -> CallFuture<'_> {
        Box::pin(async move {
            let response = match method {
                Method::Get => self.get(request).await?,
                Method::Put => self.put(request).await?,
            };
            Ok(response.into_inner())
        })
    }
}
