//! Error types shared by the client and server engines.

use std::any::Any;

use nanolink_protocol::Topic;
use thiserror::Error;

/// A failed request, carried back to the caller of `request()`.
///
/// The code is an application-defined classification; `0` is reserved for
/// success and never appears in a `RequestError` sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request failed with code {code}: {message}")]
pub struct RequestError {
    /// Numeric error classification.
    pub code: u32,
    /// Descriptive error text.
    pub message: String,
}

impl RequestError {
    /// Request payload could not be decoded by the handler.
    pub const BAD_PAYLOAD: u32 = 400;
    /// No request handler is registered for the topic.
    pub const NO_HANDLER: u32 = 404;
    /// The handler failed without choosing a code.
    pub const INTERNAL: u32 = 500;

    /// Create a new request error.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an [`RequestError::INTERNAL`] error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL, message)
    }
}

/// Why a pending continuation did not receive a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// The peer answered with a nonzero status.
    #[error(transparent)]
    Rejected(#[from] RequestError),

    /// The connection dropped before a reply arrived.
    #[error("Connection lost before a reply arrived")]
    Disconnected,
}

/// An application handler failed while processing a record.
#[derive(Debug, Clone, Error)]
#[error("Handler for topic {topic} failed: {reason}")]
pub struct DispatchError {
    /// Topic being dispatched.
    pub topic: Topic,
    /// Failure description.
    pub reason: String,
}

impl DispatchError {
    /// Create a new dispatch error.
    #[must_use]
    pub fn new(topic: Topic, reason: impl Into<String>) -> Self {
        Self {
            topic,
            reason: reason.into(),
        }
    }

    /// Build a dispatch error from a caught panic payload.
    #[must_use]
    pub fn from_panic(topic: Topic, panic: Box<dyn Any + Send>) -> Self {
        Self::new(topic, panic_message(panic.as_ref()))
    }
}

/// Extract the message from a panic payload.
#[must_use]
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_display() {
        let err = RequestError::new(42, "out of stock");
        assert_eq!(err.to_string(), "Request failed with code 42: out of stock");
    }

    #[test]
    fn test_reply_error_from_request_error() {
        let reply: ReplyError = RequestError::internal("boom").into();
        assert_eq!(
            reply,
            ReplyError::Rejected(RequestError::new(RequestError::INTERNAL, "boom"))
        );
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("bad input")).unwrap_err();
        let err = DispatchError::from_panic(Topic::from(1u32), caught);
        assert_eq!(err.reason, "handler panicked: bad input");
    }
}
