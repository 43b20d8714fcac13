//! # nanolink-transport
//!
//! Transport abstraction layer for the nanolink messaging engine.
//!
//! - **TCP** - [`TcpTransport`] / [`TcpConnector`]
//! - **Unix sockets** - `UnixTransport` / `UnixConnector` (Unix only)
//!
//! The engines never create sockets themselves. A server is handed a
//! [`Transport`] and a client a [`Connector`]; each resulting stream is
//! wrapped in a [`Connection`] that handles framing.
//!
//! ```rust,ignore
//! use nanolink_transport::{Connection, Received, Transport};
//!
//! async fn handle(transport: &dyn Transport) {
//!     let accepted = transport.accept().await.unwrap();
//!     let (outbound, mut inbound) =
//!         Connection::new(accepted.stream, accepted.remote_addr, 1 << 20).into_parts();
//!     while let Ok(Some(Received::Message(message))) = inbound.recv().await {
//!         // Process message
//!     }
//! }
//! ```

pub mod connection;
pub mod endpoint;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod unix;

pub use connection::{Connection, Inbound, Outbound, Received};
pub use endpoint::Endpoint;
pub use tcp::{TcpConnector, TcpTransport};
pub use traits::{Accepted, AsyncStream, BoxedStream, ConnectionId, Connector, Transport, TransportError};

#[cfg(unix)]
pub use unix::{UnixConnector, UnixTransport};
