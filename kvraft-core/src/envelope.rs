//! Request/response envelope codec.
//!
//! A request envelope travels twice: as a gRPC message from client to router,
//! and as the opaque payload of a consensus operation from router to every
//! replica's state machine. Both use the same protobuf encoding.

use crate::proto::{Request, Response};
use crate::ClientId;
use prost::Message;

/// Build a request envelope.
pub fn request(
    key: impl Into<String>,
    value: impl Into<String>,
    client: ClientId,
    sequence_number: u64,
) -> Request {
    Request {
        key: key.into(),
        value: value.into(),
        client,
        sequence_number,
    }
}

/// Build a response envelope.
pub fn response(value: impl Into<String>) -> Response {
    Response {
        value: value.into(),
    }
}

/// Encode a request envelope into a consensus payload.
///
/// Encoding into a growable buffer cannot fail.
pub fn encode_request(request: &Request) -> Vec<u8> {
    request.encode_to_vec()
}

/// Decode a consensus payload back into a request envelope.
pub fn decode_request(payload: &[u8]) -> Result<Request, prost::DecodeError> {
    Request::decode(payload)
}
