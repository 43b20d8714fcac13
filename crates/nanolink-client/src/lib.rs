//! # nanolink-client
//!
//! Client engine for nanolink: fire-and-forget sends, correlated requests
//! and ref-counted topic subscriptions over one connection, with automatic
//! reconnection.
//!
//! ```rust,no_run
//! use nanolink_client::{Client, ClientConfig};
//!
//! # async fn example() -> Result<(), nanolink_client::ClientError> {
//! let client = Client::new(ClientConfig::new("127.0.0.1:3333".parse()?))?;
//! client.connect().await?;
//!
//! client.send(1, r#"{"foo":"bar"}"#)?;
//! let reply = client.request("echo", "hello").await?;
//!
//! let subscription = client
//!     .subscribe("news", |payload| println!("news: {payload}"))
//!     .await?;
//! subscription.unsubscribe();
//!
//! client.close().await;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod driver;
pub mod error;
pub mod state;

pub use client::{Client, Subscription};
pub use config::ClientConfig;
pub use error::ClientError;
pub use state::{ClientEvent, ConnectionState};

pub use nanolink_core::{ReconnectDelay, RequestError};
pub use nanolink_transport::Endpoint;
