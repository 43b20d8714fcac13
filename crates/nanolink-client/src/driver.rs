//! Connection driver task.
//!
//! One driver runs per client and owns the connection lifecycle:
//!
//! ```text
//! Disconnected ─► Connecting ─► Connected ─► Disconnected
//!                     ▲                           │
//!                     └──── backoff (reconnect) ◄─┘
//! ```
//!
//! Being the only task that dials, the driver is also the only place a
//! reconnect timer can be pending.

use std::sync::Arc;

use nanolink_transport::{Connection, Inbound, Received, TransportError};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::client::Inner;
use crate::state::{ClientEvent, ConnectionState};

pub(crate) async fn run(inner: Arc<Inner>, first: oneshot::Sender<Result<(), TransportError>>) {
    let mut first = Some(first);
    let mut closed = inner.closed.subscribe();
    let mut attempt: u32 = 0;
    let target = inner.connector.target();

    loop {
        if inner.is_closed() {
            break;
        }

        inner.set_state(ConnectionState::Connecting);
        inner.emit(ClientEvent::Connecting);
        debug!(target = %target, attempt, "Connecting");

        let result = tokio::select! {
            result = inner.connector.connect() => result,
            () = closed_signal(&mut closed) => break,
        };

        match result {
            Ok(stream) => {
                attempt = 0;
                let connection = Connection::new(stream, Some(target.clone()), inner.config.max_frame_size);
                let (outbound, inbound) = connection.into_parts();

                let topics = inner.subscriptions.reannounce(|topic, ack| {
                    if let Err(e) = inner.announce(topic, ack, &outbound) {
                        warn!(topic = %topic, error = %e, "Resubscribe failed");
                    }
                });
                if topics > 0 {
                    debug!(topics, "Resubscribed");
                }

                inner.attach(outbound);
                inner.set_state(ConnectionState::Connected);
                inner.emit(ClientEvent::Connected);
                info!(target = %target, "Connected");
                if let Some(tx) = first.take() {
                    let _ = tx.send(Ok(()));
                }

                session(&inner, inbound, &mut closed).await;

                inner.detach();
                inner.set_state(ConnectionState::Disconnected);
                inner.emit(ClientEvent::Disconnected);
                info!(target = %target, "Disconnected");
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Connection attempt failed");
                inner.set_state(ConnectionState::Disconnected);
                inner.emit(ClientEvent::Error(e.to_string()));
                if let Some(tx) = first.take() {
                    let _ = tx.send(Err(e));
                }
            }
        }

        if inner.is_closed() || !inner.config.reconnect {
            break;
        }

        let delay = inner.config.reconnect_delay.delay(attempt);
        attempt = attempt.saturating_add(1);
        debug!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting after delay");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = closed_signal(&mut closed) => break,
        }
    }

    // Without a reconnect nothing will re-announce pending topics.
    if !inner.is_closed() {
        let dropped = inner.subscriptions.drop_unacknowledged();
        if dropped > 0 {
            debug!(dropped, "Dropped unacknowledged subscriptions");
        }
    }

    inner.set_state(ConnectionState::Disconnected);
    debug!(target = %target, "Connection driver stopped");
}

/// Read and dispatch records until the stream ends or the client closes.
async fn session(inner: &Inner, mut inbound: Inbound, closed: &mut watch::Receiver<bool>) {
    loop {
        tokio::select! {
            received = inbound.recv() => match received {
                Ok(Some(Received::Message(message))) => inner.dispatch(message),
                Ok(Some(Received::Malformed(e))) => {
                    warn!(error = %e, "Dropping malformed record");
                    inner.emit(ClientEvent::Error(e.to_string()));
                }
                Ok(None) => {
                    debug!("Server closed the connection");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Connection failed");
                    inner.emit(ClientEvent::Error(e.to_string()));
                    return;
                }
            },
            () = closed_signal(closed) => return,
        }
    }
}

async fn closed_signal(closed: &mut watch::Receiver<bool>) {
    // A dropped sender counts as closed.
    let _ = closed.wait_for(|closed| *closed).await;
}
