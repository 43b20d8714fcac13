//! Unix domain socket transport implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::traits::{Accepted, BoxedStream, Connector, Transport, TransportError};

/// Accepts connections on a Unix domain socket.
pub struct UnixTransport {
    listener: UnixListener,
    path: Option<PathBuf>,
}

impl UnixTransport {
    /// Wrap a bound listener.
    #[must_use]
    pub fn new(listener: UnixListener) -> Self {
        let path = listener
            .local_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(Path::to_path_buf));
        Self { listener, path }
    }

    /// Bind a listener on the given socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let listener = UnixListener::bind(path)?;
        info!("Unix transport listening on {}", path.display());
        Ok(Self::new(listener))
    }
}

#[async_trait]
impl Transport for UnixTransport {
    async fn accept(&self) -> Result<Accepted, TransportError> {
        let (stream, _) = self.listener.accept().await?;
        debug!("Accepted Unix socket connection");
        Ok(Accepted {
            stream: Box::new(stream),
            remote_addr: None,
        })
    }

    fn name(&self) -> &'static str {
        "unix"
    }

    fn local_addr(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.display().to_string())
    }
}

/// Dials a Unix domain socket path.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    /// Create a connector for a socket path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for UnixConnector {
    async fn connect(&self) -> Result<BoxedStream, TransportError> {
        let stream = UnixStream::connect(&self.path).await?;
        Ok(Box::new(stream))
    }

    fn target(&self) -> String {
        format!("unix:{}", self.path.display())
    }
}
