//! Client error types.

use nanolink_core::RequestError;
use nanolink_protocol::{PayloadError, ProtocolError};
use nanolink_transport::TransportError;
use thiserror::Error;

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No connection is currently established.
    #[error("Not connected")]
    NotConnected,

    /// The client was closed.
    #[error("Client closed")]
    Closed,

    /// The connection dropped before the server replied.
    #[error("Connection lost before a reply arrived")]
    Disconnected,

    /// The server answered a request with a nonzero status.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The topic or record was invalid.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A structured payload could not be encoded or decoded.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl ClientError {
    /// The request error code, if the server rejected a request.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            ClientError::Request(e) => Some(e.code),
            _ => None,
        }
    }
}
