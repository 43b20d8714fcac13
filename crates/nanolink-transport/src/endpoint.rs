//! Client endpoint descriptions.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tcp::TcpConnector;
use crate::traits::{Connector, TransportError};

/// Where a client connects to.
///
/// Parsed from `"host:port"` or `"unix:/path/to.sock"`; in configuration
/// files either `{ host, port }` or `{ path }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    /// TCP host and port.
    Tcp {
        /// Host name or address.
        #[serde(default = "default_host")]
        host: String,
        /// Port number.
        port: u16,
    },
    /// Unix domain socket path.
    Unix {
        /// Socket path.
        path: PathBuf,
    },
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Endpoint {
    /// TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Unix socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix { path: path.into() }
    }

    /// Build a connector that dials this endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error for Unix endpoints on platforms without Unix sockets.
    pub fn connector(&self) -> Result<Arc<dyn Connector>, TransportError> {
        match self {
            Endpoint::Tcp { host, port } => Ok(Arc::new(TcpConnector::new(host.clone(), *port))),
            #[cfg(unix)]
            Endpoint::Unix { path } => Ok(Arc::new(crate::unix::UnixConnector::new(path.clone()))),
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => Err(TransportError::Other(
                "Unix sockets are not supported on this platform".into(),
            )),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::Other("Empty socket path".into()));
            }
            return Ok(Endpoint::unix(path));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TransportError::Other(format!("Expected host:port, got {s:?}")))?;
        let port = port
            .parse()
            .map_err(|_| TransportError::Other(format!("Invalid port in {s:?}")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Ok(Endpoint::tcp(default_host(), port));
        }
        Ok(Endpoint::tcp(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        let endpoint: Endpoint = "localhost:3333".parse().unwrap();
        assert_eq!(endpoint, Endpoint::tcp("localhost", 3333));
        assert_eq!(endpoint.to_string(), "localhost:3333");

        let bare: Endpoint = ":3333".parse().unwrap();
        assert_eq!(bare, Endpoint::tcp("127.0.0.1", 3333));

        let v6: Endpoint = "[::1]:4000".parse().unwrap();
        assert_eq!(v6, Endpoint::tcp("::1", 4000));
    }

    #[test]
    fn test_parse_unix() {
        let endpoint: Endpoint = "unix:/tmp/nanolink.sock".parse().unwrap();
        assert_eq!(endpoint, Endpoint::unix("/tmp/nanolink.sock"));
        assert_eq!(endpoint.to_string(), "unix:/tmp/nanolink.sock");
    }

    #[test]
    fn test_parse_errors() {
        assert!("no-port".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
        assert!("unix:".parse::<Endpoint>().is_err());
    }
}
