//! Transport abstraction traits for nanolink.
//!
//! Socket creation lives outside the engines: the server is handed a
//! [`Transport`] that accepts connections and the client a [`Connector`] that
//! dials one. Both produce plain byte streams.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use nanolink_protocol::ProtocolError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Counter for connection identities within this process.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a connection ID unique within this process.
    #[must_use]
    pub fn generate() -> Self {
        let n = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}", n))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Record could not be framed for sending.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A bidirectional, ordered byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// A type-erased byte stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// A connection handed out by a [`Transport`].
pub struct Accepted {
    /// The connected stream.
    pub stream: BoxedStream,
    /// The peer address, if the transport knows it.
    pub remote_addr: Option<String>,
}

impl fmt::Debug for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accepted")
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

/// A listening transport that can accept connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Accept a new connection.
    ///
    /// This method waits until a new connection is available or an error occurs.
    async fn accept(&self) -> Result<Accepted, TransportError>;

    /// Get the transport name (e.g., "tcp", "unix").
    fn name(&self) -> &'static str;

    /// Get the address this transport listens on, if available.
    fn local_addr(&self) -> Option<String> {
        None
    }
}

/// Dials a fresh connection, once per connect or reconnect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new stream to the target.
    async fn connect(&self) -> Result<BoxedStream, TransportError>;

    /// Human-readable target, for logs.
    fn target(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_connection_id_from_string() {
        let id: ConnectionId = "test-id".into();
        assert_eq!(id.as_str(), "test-id");
    }
}
