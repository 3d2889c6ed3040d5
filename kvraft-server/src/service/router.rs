//! KeyValue gRPC service implementation.

use super::engine::ConsensusEngine;
use crate::error::SubmitError;
use crate::halt::Halt;
use crate::operation::{Operation, OperationKind};
use kvraft_core::proto::key_value_server::KeyValue;
use kvraft_core::proto::{Request, Response};
use std::time::Duration;
use tonic::Status;

/// Deadline for one submission to the consensus engine.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_millis(500);

const NOT_LEADER: &str = "this node is not the leader";
const TIMED_OUT: &str = "the submitted operation timed out";

/// gRPC service routing key-value calls into the consensus engine.
///
/// There is no forwarding and no server-side retry: a follower answers
/// `FAILED_PRECONDITION` and the client moves on to another node.
pub struct KvService<E> {
    engine: E,
    halt: Halt,
}

impl<E: ConsensusEngine> KvService<E> {
    /// Create a router over `engine`; fatal engine errors raise `halt`.
    pub fn new(engine: E, halt: Halt) -> Self {
        Self { engine, halt }
    }

    /// Submit `request` as an operation of `kind` and wait for its response.
    pub async fn submit_operation(
        &self,
        request: Request,
        kind: OperationKind,
    ) -> Result<Response, Status> {
        let operation = Operation::from_request(&request, kind);

        tracing::debug!(
            client = request.client,
            sequence_number = request.sequence_number,
            %kind,
            "submitting operation"
        );

        match self.engine.submit(operation, SUBMIT_TIMEOUT).await {
            Ok(response) => Ok(response),
            Err(SubmitError::NotLeader { leader }) => {
                tracing::debug!(?leader, "rejecting request: not the leader");
                Err(Status::failed_precondition(NOT_LEADER))
            }
            Err(SubmitError::Timeout) => {
                tracing::warn!(
                    client = request.client,
                    sequence_number = request.sequence_number,
                    "operation timed out"
                );
                Err(Status::unavailable(TIMED_OUT))
            }
            Err(SubmitError::Fatal(reason)) => {
                tracing::error!(%reason, "fatal consensus error, halting node");
                self.halt.trigger();
                Err(Status::internal(reason))
            }
        }
    }
}

#[tonic::async_trait]
impl<E: ConsensusEngine> KeyValue for KvService<E> {
    async fn get(
        &self,
        request: tonic::Request<Request>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.submit_operation(request.into_inner(), OperationKind::LinearizableReadOnly)
            .await
            .map(tonic::Response::new)
    }

    async fn put(
        &self,
        request: tonic::Request<Request>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.submit_operation(request.into_inner(), OperationKind::Replicated)
            .await
            .map(tonic::Response::new)
    }
}
