//! # nanolink server
//!
//! Demo server with an `echo` request handler and a `broadcast` topic.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! nanolink
//!
//! # Run with environment variables
//! NANOLINK_PORT=4000 NANOLINK_HOST=0.0.0.0 nanolink
//! ```

use anyhow::Result;
use nanolink_server::{metrics, Config, Server};
use nanolink_transport::TcpTransport;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanolink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    info!("Starting nanolink server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let server = Server::with_limits(config.limits.clone());

    server.on_request("echo", |payload| async move { Ok(payload) })?;

    let pusher = server.clone();
    server.on_message("broadcast", move |payload| {
        if let Err(e) = pusher.push("broadcast", payload) {
            warn!(error = %e, "Broadcast failed");
        }
    })?;

    let transport = TcpTransport::bind(config.bind_addr()?).await?;

    tokio::select! {
        () = server.listen(transport) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
    }

    Ok(())
}
