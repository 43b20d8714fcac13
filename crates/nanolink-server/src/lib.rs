//! # nanolink-server
//!
//! Server engine for nanolink. A [`Server`] dispatches Send records to
//! message handlers, answers Request records through request handlers, keeps
//! the per-topic subscriber sets and pushes records to subscribers.
//!
//! ```rust,no_run
//! use nanolink_server::Server;
//! use nanolink_transport::TcpTransport;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new();
//! server.on_message(1, |payload| println!("got {payload}"))?;
//! server.on_request("echo", |payload| async move { Ok(payload) })?;
//!
//! let transport = TcpTransport::bind("127.0.0.1:3333".parse()?).await?;
//! server.listen(transport).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use config::Config;
pub use error::ServerError;
pub use server::{RequestFuture, RequestHandler, Server};

pub use nanolink_core::{RequestError, TopicStats};
