//! TCP transport implementation.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::traits::{Accepted, BoxedStream, Connector, Transport, TransportError};

/// Accepts connections from an already bound TCP listener.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Wrap a bound listener.
    #[must_use]
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// Bind a listener on the given address.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!("TCP transport listening on {}", addr);
        Ok(Self::new(listener))
    }

    /// Get the local address this transport is bound to.
    #[must_use]
    pub fn local_socket_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

impl From<TcpListener> for TcpTransport {
    fn from(listener: TcpListener) -> Self {
        Self::new(listener)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn accept(&self) -> Result<Accepted, TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;

        debug!("Accepted TCP connection from {}", addr);

        Ok(Accepted {
            stream: Box::new(stream),
            remote_addr: Some(addr.to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "tcp"
    }

    fn local_addr(&self) -> Option<String> {
        self.local_socket_addr().map(|addr| addr.to_string())
    }
}

/// Dials a TCP host and port.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    /// Create a connector for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<BoxedStream, TransportError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_connect_and_accept() {
        let transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = transport.local_socket_addr().unwrap();
        let connector = TcpConnector::new("127.0.0.1", addr.port());
        assert_eq!(connector.target(), format!("127.0.0.1:{}", addr.port()));

        let (client, accepted) = tokio::join!(connector.connect(), transport.accept());
        let mut client = client.unwrap();
        let mut accepted = accepted.unwrap();
        assert!(accepted.remote_addr.is_some());

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        accepted.stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(transport.name(), "tcp");
    }
}
