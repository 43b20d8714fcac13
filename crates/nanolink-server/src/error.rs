//! Server error types.

use nanolink_protocol::{PayloadError, ProtocolError};
use thiserror::Error;

/// Errors returned by [`Server`](crate::Server) registration and push.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid topic, or a record too large to frame.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A structured payload could not be encoded.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}
