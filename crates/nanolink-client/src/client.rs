//! The client engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use nanolink_core::handlers::dispatch;
use nanolink_core::{
    AckSignal, HandlerId, PendingGuard, ReplyError, RequestTable, SubscriptionRegistry,
};
use nanolink_protocol::{IntoTopic, Json, Message, PayloadCodec, Topic};
use nanolink_transport::{Connector, Outbound};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::driver;
use crate::error::ClientError;
use crate::state::{ClientEvent, ConnectionState};

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 64;

/// A nanolink client.
///
/// Cloning is cheap; clones share one connection. Call [`Client::close`] to
/// stop the connection driver and wait for it; dropping the last clone
/// stops it too, without waiting.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
    _handle: Arc<LastHandle>,
}

/// Shuts the client down when the last [`Client`] clone goes away.
///
/// The driver task holds its own `Arc<Inner>`.
struct LastHandle(Weak<Inner>);

impl Drop for LastHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.0.upgrade() {
            if inner.shutdown() {
                debug!("Last client handle dropped");
            }
        }
    }
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    outbound: watch::Sender<Option<Outbound>>,
    pub(crate) requests: RequestTable,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) closed: watch::Sender<bool>,
    events: broadcast::Sender<ClientEvent>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Create a client for the configured endpoint.
    ///
    /// No connection is made until [`Client::connect`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not usable on this platform.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let connector = config.endpoint.connector()?;
        Ok(Self::with_connector(config, connector))
    }

    /// Create a client that dials through the given connector.
    ///
    /// The endpoint in `config` is ignored.
    #[must_use]
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            config,
            connector,
            state: watch::Sender::new(ConnectionState::Disconnected),
            outbound: watch::Sender::new(None),
            requests: RequestTable::new(),
            subscriptions: SubscriptionRegistry::new(),
            closed: watch::Sender::new(false),
            events,
            driver: Mutex::new(None),
        });
        let handle = Arc::new(LastHandle(Arc::downgrade(&inner)));
        Self { inner, _handle: handle }
    }

    /// Start the connection driver and wait for the first attempt.
    ///
    /// If that attempt fails and reconnection is enabled, the driver keeps
    /// retrying in the background. Does nothing if the driver is already
    /// running.
    ///
    /// # Errors
    ///
    /// Returns the transport error of a failed first attempt, or
    /// [`ClientError::Closed`] after [`Client::close`].
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.inner.is_closed() {
            return Err(ClientError::Closed);
        }

        let first = {
            let mut slot = self.inner.driver.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
                debug!("Connection driver already running");
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            *slot = Some(tokio::spawn(driver::run(Arc::clone(&self.inner), tx)));
            rx
        };

        match first.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ClientError::Transport(e)),
            Err(_) => Err(ClientError::Closed),
        }
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Pending requests fail with [`ClientError::Disconnected`] and pending
    /// subscriptions with [`ClientError::Closed`].
    pub async fn close(&self) {
        if !self.inner.shutdown() {
            return;
        }
        debug!("Closing client");

        let handle = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Connection driver failed");
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to lifecycle and error events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Send a fire-and-forget message.
    ///
    /// Returns once the record is handed to the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid or no connection is up.
    pub fn send(&self, topic: impl IntoTopic, payload: impl Into<String>) -> Result<(), ClientError> {
        let topic = topic.into_topic()?;
        let outbound = self.inner.outbound()?;
        outbound.send(&Message::send(topic, payload))?;
        Ok(())
    }

    /// Send a value encoded as JSON.
    ///
    /// # Errors
    ///
    /// See [`Client::send`]; also fails if the value cannot be encoded.
    pub fn send_json<T: Serialize + ?Sized>(&self, topic: impl IntoTopic, value: &T) -> Result<(), ClientError> {
        self.send_with::<Json, T>(topic, value)
    }

    /// Send a value encoded with the given codec.
    ///
    /// # Errors
    ///
    /// See [`Client::send`]; also fails if the value cannot be encoded.
    pub fn send_with<C: PayloadCodec, T: Serialize + ?Sized>(
        &self,
        topic: impl IntoTopic,
        value: &T,
    ) -> Result<(), ClientError> {
        self.send(topic, C::encode(value)?)
    }

    /// Send a request and wait for its response payload.
    ///
    /// Dropping the returned future abandons the request; a late response
    /// is then ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] with the server's code and message
    /// on a nonzero status, or [`ClientError::Disconnected`] if the
    /// connection drops first.
    pub async fn request(&self, topic: impl IntoTopic, payload: impl Into<String>) -> Result<String, ClientError> {
        let topic = topic.into_topic()?;
        let inner = &self.inner;

        // Registered before the outbound is read: a disconnect in between
        // rejects the entry instead of leaving it pending.
        let request_id = inner.requests.next_id();
        let reply = inner.requests.register_oneshot(request_id);
        let _guard = PendingGuard::new(&inner.requests, request_id);

        let outbound = inner.outbound()?;
        trace!(topic = %topic, request_id, "Sending request");
        outbound.send(&Message::request(topic, request_id, payload))?;

        match reply.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(ReplyError::Rejected(e))) => Err(ClientError::Request(e)),
            Ok(Err(ReplyError::Disconnected)) | Err(_) => Err(ClientError::Disconnected),
        }
    }

    /// Send a JSON request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`Client::request`]; also fails if either payload cannot be
    /// encoded or decoded.
    pub async fn request_json<Req, Resp>(&self, topic: impl IntoTopic, value: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.request_with::<Json, Req, Resp>(topic, value).await
    }

    /// Send a request and decode the response with the given codec.
    ///
    /// # Errors
    ///
    /// See [`Client::request_json`].
    pub async fn request_with<C, Req, Resp>(&self, topic: impl IntoTopic, value: &Req) -> Result<Resp, ClientError>
    where
        C: PayloadCodec,
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = C::encode(value)?;
        let response = self.request(topic, payload).await?;
        Ok(C::decode(&response)?)
    }

    /// Register a handler for a topic.
    ///
    /// The first handler of a topic sends a Subscribe record and waits for
    /// the server's acknowledgment. Later handlers for the same topic join
    /// the existing registration and wait for the same acknowledgment, if it
    /// is still outstanding.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid, the Subscribe record cannot
    /// be sent, or the client is closed while waiting. If the connection
    /// drops while waiting and reconnection is disabled, fails with
    /// [`ClientError::Disconnected`].
    pub async fn subscribe<F>(&self, topic: impl IntoTopic, handler: F) -> Result<Subscription, ClientError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let topic = topic.into_topic()?;
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(ClientError::Closed);
        }

        let pending = inner.subscriptions.subscribe(&topic, Arc::new(handler), |ack| {
            let outbound = inner.outbound()?;
            inner.announce(&topic, ack, &outbound)
        })?;

        let subscription = Subscription {
            client: Arc::downgrade(inner),
            topic,
            handler_id: pending.handler_id(),
            active: AtomicBool::new(true),
        };

        // Abandoning the wait removes the handler again.
        let guard = Abandon(Some(&subscription));
        let acked = pending.acknowledged().await;
        guard.disarm();

        match acked {
            Ok(_) => Ok(subscription),
            Err(_) if inner.is_closed() => Err(ClientError::Closed),
            Err(_) => Err(ClientError::Disconnected),
        }
    }

    /// Register a handler receiving JSON-decoded values.
    ///
    /// Payloads that fail to decode are reported as [`ClientEvent::Error`]
    /// and skipped.
    ///
    /// # Errors
    ///
    /// See [`Client::subscribe`].
    pub async fn subscribe_json<T, F>(&self, topic: impl IntoTopic, handler: F) -> Result<Subscription, ClientError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with::<Json, T, F>(topic, handler).await
    }

    /// Register a handler receiving values decoded with the given codec.
    ///
    /// # Errors
    ///
    /// See [`Client::subscribe`].
    pub async fn subscribe_with<C, T, F>(&self, topic: impl IntoTopic, handler: F) -> Result<Subscription, ClientError>
    where
        C: PayloadCodec + 'static,
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let topic = topic.into_topic()?;
        let events = self.inner.events.clone();
        let name = topic.clone();
        self.subscribe(topic, move |payload: &str| match C::decode::<T>(payload) {
            Ok(value) => handler(value),
            Err(e) => {
                warn!(topic = %name, error = %e, "Dropping undecodable payload");
                let _ = events.send(ClientEvent::Error(e.to_string()));
            }
        })
        .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("target", &self.inner.connector.target())
            .field("state", &*self.inner.state.borrow())
            .field("requests", &self.inner.requests)
            .field("subscriptions", &self.inner.subscriptions)
            .finish()
    }
}

impl Inner {
    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Mark the client closed and drop the connection and every topic.
    ///
    /// Returns `false` if it was already closed.
    fn shutdown(&self) -> bool {
        if self.closed.send_replace(true) {
            return false;
        }
        self.detach();
        self.subscriptions.clear();
        true
    }

    fn outbound(&self) -> Result<Outbound, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.outbound.borrow().clone().ok_or(ClientError::NotConnected)
    }

    /// Publish a fresh connection's write handle.
    pub(crate) fn attach(&self, outbound: Outbound) {
        self.outbound.send_replace(Some(outbound));
    }

    /// Drop the write handle and fail every pending request.
    pub(crate) fn detach(&self) {
        self.outbound.send_replace(None);
        let rejected = self.requests.reject_all(ReplyError::Disconnected);
        if rejected > 0 {
            debug!(rejected, "Rejected pending requests");
        }
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Send a Subscribe record whose acknowledgment completes `ack`.
    pub(crate) fn announce(&self, topic: &Topic, ack: &AckSignal, outbound: &Outbound) -> Result<(), ClientError> {
        let request_id = self.requests.next_id();
        let signal = ack.clone();
        self.requests.register(request_id, move |reply| {
            // Any response acknowledges; a dropped connection re-announces.
            if !matches!(reply, Err(ReplyError::Disconnected)) {
                signal.ack();
            }
        });

        if let Err(e) = outbound.send(&Message::subscribe(topic.clone(), request_id)) {
            self.requests.remove(request_id);
            return Err(e.into());
        }
        trace!(topic = %topic, request_id, "Subscribe sent");
        Ok(())
    }

    fn retire(&self, topic: &Topic) {
        let Ok(outbound) = self.outbound() else {
            return;
        };
        if let Err(e) = outbound.send(&Message::unsubscribe(topic.clone())) {
            debug!(topic = %topic, error = %e, "Unsubscribe not sent");
        }
    }

    pub(crate) fn dispatch(&self, message: Message) {
        match message {
            Message::Response {
                request_id,
                status,
                payload,
            } => {
                self.requests.settle(request_id, status, payload);
            }
            Message::Send { topic, payload } => {
                let handlers = self.subscriptions.handlers(&topic);
                if handlers.is_empty() {
                    trace!(topic = %topic, "No handlers for message");
                    return;
                }
                for failure in dispatch(&topic, &handlers, &payload) {
                    self.emit(ClientEvent::Error(failure.to_string()));
                }
            }
            other => {
                warn!(kind = ?other.kind(), "Unexpected record from server");
            }
        }
    }
}

/// Handle to a registered topic handler.
///
/// Dropping the handle leaves the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    client: Weak<Inner>,
    topic: Topic,
    handler_id: HandlerId,
    active: AtomicBool,
}

impl Subscription {
    /// Topic this handler is registered for.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Check if [`Subscription::unsubscribe`] has not been called yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the handler.
    ///
    /// When it was the topic's last handler, an Unsubscribe record is sent
    /// without waiting for any acknowledgment. Calling this again does
    /// nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(inner) = self.client.upgrade() else {
            return;
        };
        inner
            .subscriptions
            .unsubscribe(&self.topic, self.handler_id, || inner.retire(&self.topic));
    }
}

struct Abandon<'a>(Option<&'a Subscription>);

impl Abandon<'_> {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for Abandon<'_> {
    fn drop(&mut self) {
        if let Some(subscription) = self.0 {
            subscription.unsubscribe();
        }
    }
}
