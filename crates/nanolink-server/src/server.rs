//! The server engine.
//!
//! Each accepted connection is served by its own task, which dispatches
//! records strictly in arrival order:
//!
//! - `!` Send: every message handler of the topic
//! - `?` Request: the topic's request handler, answered with `<`
//! - `+` Subscribe: join the topic, answered with an acknowledgment
//! - `-` Unsubscribe: leave the topic

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use nanolink_core::error::panic_message;
use nanolink_core::handlers::dispatch;
use nanolink_core::{HandlerId, HandlerSet, MessageHandler, RequestError, TopicRegistry, TopicStats};
use nanolink_protocol::{Framer, IntoTopic, Json, Message, PayloadCodec, Topic, STATUS_OK};
use nanolink_transport::{AsyncStream, Connection, ConnectionId, Outbound, Received, Transport, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::LimitsConfig;
use crate::error::ServerError;
use crate::metrics::{self, ConnectionMetricsGuard};

/// Pause after a failed accept.
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Future returned by a request handler.
pub type RequestFuture = BoxFuture<'static, Result<String, RequestError>>;

/// Handler producing the response payload for a request.
pub type RequestHandler = Arc<dyn Fn(String) -> RequestFuture + Send + Sync>;

/// A nanolink server.
///
/// Cloning is cheap; clones share handlers, topics and connections.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    limits: LimitsConfig,
    framer: Framer,
    message_handlers: DashMap<Topic, HandlerSet<MessageHandler>>,
    request_handlers: DashMap<Topic, RequestHandler>,
    topics: TopicRegistry<ConnectionId>,
    connections: DashMap<ConnectionId, Outbound>,
    accepted: AtomicUsize,
}

impl Server {
    /// Create a server with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(LimitsConfig::default())
    }

    /// Create a server with the given limits.
    #[must_use]
    pub fn with_limits(limits: LimitsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                framer: Framer::new(limits.max_frame_size),
                limits,
                message_handlers: DashMap::new(),
                request_handlers: DashMap::new(),
                topics: TopicRegistry::new(),
                connections: DashMap::new(),
                accepted: AtomicUsize::new(0),
            }),
        }
    }

    /// Register a handler for every Send record on a topic.
    ///
    /// Any number of handlers may be registered per topic; all of them run,
    /// in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid.
    pub fn on_message<F>(&self, topic: impl IntoTopic, handler: F) -> Result<HandlerId, ServerError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let topic = topic.into_topic()?;
        let mut set = self.inner.message_handlers.entry(topic.clone()).or_default();
        let id = set.insert(Arc::new(handler));
        debug!(topic = %topic, handlers = set.len(), "Message handler registered");
        Ok(id)
    }

    /// Register a handler receiving JSON-decoded message payloads.
    ///
    /// Payloads that fail to decode are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid.
    pub fn on_message_json<T, F>(&self, topic: impl IntoTopic, handler: F) -> Result<HandlerId, ServerError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_message_with::<Json, T, F>(topic, handler)
    }

    /// Register a handler receiving payloads decoded with the given codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid.
    pub fn on_message_with<C, T, F>(&self, topic: impl IntoTopic, handler: F) -> Result<HandlerId, ServerError>
    where
        C: PayloadCodec + 'static,
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let topic = topic.into_topic()?;
        let name = topic.clone();
        self.on_message(topic, move |payload: &str| match C::decode::<T>(payload) {
            Ok(value) => handler(value),
            Err(e) => {
                warn!(topic = %name, error = %e, "Dropping undecodable payload");
                metrics::record_error("payload");
            }
        })
    }

    /// Remove a message handler.
    ///
    /// Returns `true` if the handler was registered.
    pub fn off_message(&self, topic: &Topic, id: HandlerId) -> bool {
        let removed = self
            .inner
            .message_handlers
            .get_mut(topic)
            .is_some_and(|mut set| set.remove(id));
        self.inner.message_handlers.remove_if(topic, |_, set| set.is_empty());
        removed
    }

    /// Register the handler answering Request records on a topic.
    ///
    /// A topic has at most one request handler; registering again replaces
    /// it. `Ok` is sent back with status 0, `Err` with the error's code.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid.
    pub fn on_request<F, Fut>(&self, topic: impl IntoTopic, handler: F) -> Result<(), ServerError>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, RequestError>> + Send + 'static,
    {
        let topic = topic.into_topic()?;
        let handler: RequestHandler = Arc::new(move |payload| handler(payload).boxed());
        if self.inner.request_handlers.insert(topic.clone(), handler).is_some() {
            debug!(topic = %topic, "Request handler replaced");
        } else {
            debug!(topic = %topic, "Request handler registered");
        }
        Ok(())
    }

    /// Register a request handler working on JSON values.
    ///
    /// A request payload that fails to decode is answered with
    /// [`RequestError::BAD_PAYLOAD`].
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid.
    pub fn on_request_json<Req, Resp, F, Fut>(&self, topic: impl IntoTopic, handler: F) -> Result<(), ServerError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, RequestError>> + Send + 'static,
    {
        self.on_request_with::<Json, Req, Resp, F, Fut>(topic, handler)
    }

    /// Register a request handler working on values of the given codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid.
    pub fn on_request_with<C, Req, Resp, F, Fut>(&self, topic: impl IntoTopic, handler: F) -> Result<(), ServerError>
    where
        C: PayloadCodec + 'static,
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, RequestError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.on_request(topic, move |payload: String| {
            let handler = Arc::clone(&handler);
            async move {
                let request = C::decode::<Req>(&payload)
                    .map_err(|e| RequestError::new(RequestError::BAD_PAYLOAD, e.to_string()))?;
                let response = handler(request).await?;
                C::encode(&response).map_err(|e| RequestError::internal(e.to_string()))
            }
        })
    }

    /// Send a Send record to every connection subscribed to a topic.
    ///
    /// The record is framed once. A connection that cannot take it is
    /// logged and skipped. Returns the number of connections reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid or the record exceeds the
    /// maximum frame size.
    pub fn push(&self, topic: impl IntoTopic, payload: impl Into<String>) -> Result<usize, ServerError> {
        let topic = topic.into_topic()?;
        let subscribers = self.inner.topics.subscribers(&topic);
        if subscribers.is_empty() {
            trace!(topic = %topic, "Push without subscribers");
            return Ok(0);
        }

        let frame = self.inner.framer.encode(&Message::send(topic.clone(), payload))?;
        let mut delivered = 0;
        for id in subscribers {
            let Some(outbound) = self.inner.connections.get(&id).map(|c| c.value().clone()) else {
                debug!(connection = %id, topic = %topic, "Subscriber already gone");
                continue;
            };
            match outbound.send_raw(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection = %id, topic = %topic, error = %e, "Push failed");
                    metrics::record_error("push");
                }
            }
        }

        metrics::record_push(delivered);
        trace!(topic = %topic, delivered, "Pushed");
        Ok(delivered)
    }

    /// Push a value encoded as JSON.
    ///
    /// # Errors
    ///
    /// See [`Server::push`]; also fails if the value cannot be encoded.
    pub fn push_json<T: Serialize + ?Sized>(&self, topic: impl IntoTopic, value: &T) -> Result<usize, ServerError> {
        self.push_with::<Json, T>(topic, value)
    }

    /// Push a value encoded with the given codec.
    ///
    /// # Errors
    ///
    /// See [`Server::push_json`].
    pub fn push_with<C: PayloadCodec, T: Serialize + ?Sized>(
        &self,
        topic: impl IntoTopic,
        value: &T,
    ) -> Result<usize, ServerError> {
        self.push(topic, C::encode(value)?)
    }

    /// Subscription statistics.
    #[must_use]
    pub fn stats(&self) -> TopicStats {
        self.inner.topics.stats()
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Accept connections from a transport, serving each on its own task.
    ///
    /// Runs until the returned future is dropped. Accept errors are logged
    /// and accepting continues.
    pub async fn listen(&self, transport: impl Transport) {
        info!(
            transport = transport.name(),
            addr = ?transport.local_addr(),
            "Listening"
        );

        loop {
            let accepted = match transport.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    metrics::record_error("accept");
                    tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                    continue;
                }
            };

            let Some(slot) = self.reserve() else {
                warn!(
                    remote = ?accepted.remote_addr,
                    max = self.inner.limits.max_connections,
                    "Connection limit reached, rejecting"
                );
                metrics::record_error("connection_limit");
                continue;
            };

            let server = self.clone();
            tokio::spawn(async move {
                server.serve_connection(accepted.stream, accepted.remote_addr).await;
                drop(slot);
            });
        }
    }

    /// Take one of the `max_connections` slots for an accepted connection.
    fn reserve(&self) -> Option<ConnectionSlot> {
        let max = self.inner.limits.max_connections;
        self.inner
            .accepted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| ConnectionSlot(Arc::clone(&self.inner)))
    }

    /// Serve one connection until the peer closes it.
    ///
    /// Connections served directly do not count against `max_connections`.
    ///
    /// On return the connection has left every topic.
    pub async fn serve_connection(&self, stream: impl AsyncStream, remote_addr: Option<String>) {
        let _metrics_guard = ConnectionMetricsGuard::new();
        let connection = Connection::new(stream, remote_addr, self.inner.limits.max_frame_size);
        let id = connection.id().clone();
        debug!(connection = %id, remote = ?connection.remote_addr(), "Connection opened");

        let (outbound, mut inbound) = connection.into_parts();
        self.inner.connections.insert(id.clone(), outbound.clone());

        loop {
            match inbound.recv().await {
                Ok(Some(Received::Message(message))) => {
                    metrics::record_record("inbound");
                    self.handle(&id, &outbound, message).await;
                }
                Ok(Some(Received::Malformed(e))) => {
                    warn!(connection = %id, error = %e, "Dropping malformed record");
                    metrics::record_error("malformed");
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(connection = %id, error = %e, "Connection failed");
                    metrics::record_error("transport");
                    break;
                }
            }
        }

        self.inner.connections.remove(&id);
        let topics = self.inner.topics.unsubscribe_all(&id);
        debug!(connection = %id, topics, "Connection closed");
    }

    async fn handle(&self, id: &ConnectionId, outbound: &Outbound, message: Message) {
        match message {
            Message::Send { topic, payload } => {
                let handlers = self
                    .inner
                    .message_handlers
                    .get(&topic)
                    .map(|set| set.snapshot())
                    .unwrap_or_default();
                if handlers.is_empty() {
                    trace!(connection = %id, topic = %topic, "No message handler");
                    return;
                }
                for _ in dispatch(&topic, &handlers, &payload) {
                    metrics::record_error("handler");
                }
            }
            Message::Request {
                topic,
                request_id,
                payload,
            } => {
                let handler = self
                    .inner
                    .request_handlers
                    .get(&topic)
                    .map(|h| Arc::clone(h.value()));
                let result = match handler {
                    Some(handler) => run_request(&topic, handler, payload).await,
                    None => Err(RequestError::new(
                        RequestError::NO_HANDLER,
                        format!("No handler for topic {topic}"),
                    )),
                };

                let response = match result {
                    Ok(payload) => Message::ok(request_id, payload),
                    Err(e) => {
                        debug!(connection = %id, topic = %topic, request_id, code = e.code, "Request failed");
                        let code = if e.code == STATUS_OK {
                            RequestError::INTERNAL
                        } else {
                            e.code
                        };
                        Message::error(request_id, code, e.message)
                    }
                };
                reply(id, outbound, &response, request_id);
            }
            Message::Subscribe { topic, request_id } => {
                self.inner.topics.subscribe(id, &topic);
                reply(id, outbound, &Message::ack(request_id), request_id);
            }
            Message::Unsubscribe { topic } => {
                self.inner.topics.unsubscribe(id, &topic);
            }
            Message::Response { request_id, .. } => {
                debug!(connection = %id, request_id, "Ignoring response from client");
            }
        }
    }
}

/// A reserved connection slot, released on drop.
struct ConnectionSlot(Arc<Inner>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.accepted.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("connections", &self.inner.connections.len())
            .field("message_topics", &self.inner.message_handlers.len())
            .field("request_topics", &self.inner.request_handlers.len())
            .field("stats", &self.inner.topics.stats())
            .finish()
    }
}

async fn run_request(topic: &Topic, handler: RequestHandler, payload: String) -> Result<String, RequestError> {
    match AssertUnwindSafe(async move { handler(payload).await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(topic = %topic, error = %message, "Request handler failed");
            metrics::record_error("handler");
            Err(RequestError::internal(message))
        }
    }
}

fn reply(id: &ConnectionId, outbound: &Outbound, response: &Message, request_id: u64) {
    let result = match outbound.send(response) {
        Err(TransportError::Protocol(e)) => {
            // Too large to frame; the caller still gets an answer.
            warn!(connection = %id, request_id, error = %e, "Response not sent");
            outbound.send(&Message::error(request_id, RequestError::INTERNAL, e.to_string()))
        }
        other => other,
    };

    match result {
        Ok(()) => metrics::record_record("outbound"),
        Err(e) => {
            debug!(connection = %id, request_id, error = %e, "Reply dropped");
            metrics::record_error("send");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};
    use nanolink_protocol::codec;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connection(server: &Server, name: &str) -> (ConnectionId, Outbound, UnboundedReceiver<Bytes>) {
        let id = ConnectionId::new(name);
        let (outbound, rx) = Outbound::detached(id.clone(), 1024);
        server.inner.connections.insert(id.clone(), outbound.clone());
        (id, outbound, rx)
    }

    fn decode(frame: Bytes) -> Message {
        let mut buf = BytesMut::from(&frame[..]);
        let record = Framer::default().decode_from(&mut buf).unwrap().unwrap();
        codec::decode_bytes(&record).unwrap()
    }

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_is_acked_once_registered() {
        let server = Server::new();
        let (id, outbound, mut rx) = connection(&server, "a");

        server.handle(&id, &outbound, Message::subscribe(topic("news"), 1)).await;
        server.handle(&id, &outbound, Message::subscribe(topic("news"), 2)).await;

        assert_eq!(decode(rx.recv().await.unwrap()), Message::ack(1));
        assert_eq!(decode(rx.recv().await.unwrap()), Message::ack(2));
        assert_eq!(server.stats().total_subscriptions, 1);

        server.handle(&id, &outbound, Message::unsubscribe(topic("news"))).await;
        assert_eq!(server.stats().total_subscriptions, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_request_without_handler_gets_404() {
        let server = Server::new();
        let (id, outbound, mut rx) = connection(&server, "a");

        server.handle(&id, &outbound, Message::request(topic("nope"), 5, "x")).await;

        let Message::Response { request_id, status, payload } = decode(rx.recv().await.unwrap()) else {
            panic!("Expected a response");
        };
        assert_eq!(request_id, 5);
        assert_eq!(status, RequestError::NO_HANDLER);
        assert!(payload.contains("nope"));
    }

    #[tokio::test]
    async fn test_request_error_codes() {
        let server = Server::new();
        server
            .on_request("fail", |_| async { Err(RequestError::new(13, "bad thing")) })
            .unwrap();
        server
            .on_request("zero", |_| async { Err(RequestError::new(0, "no code")) })
            .unwrap();
        server
            .on_request("panic", |payload: String| async move {
                if payload.is_empty() {
                    panic!("kaboom");
                }
                Ok(payload)
            })
            .unwrap();
        let (id, outbound, mut rx) = connection(&server, "a");

        server.handle(&id, &outbound, Message::request(topic("fail"), 1, "")).await;
        server.handle(&id, &outbound, Message::request(topic("zero"), 2, "")).await;
        server.handle(&id, &outbound, Message::request(topic("panic"), 3, "")).await;

        assert_eq!(decode(rx.recv().await.unwrap()), Message::error(1, 13, "bad thing"));
        assert_eq!(decode(rx.recv().await.unwrap()), Message::error(2, 500, "no code"));
        let Message::Response { status, payload, .. } = decode(rx.recv().await.unwrap()) else {
            panic!("Expected a response");
        };
        assert_eq!(status, 500);
        assert!(payload.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_last_request_handler_wins() {
        let server = Server::new();
        server.on_request(1, |_| async { Ok("first".to_string()) }).unwrap();
        server.on_request(1, |_| async { Ok("second".to_string()) }).unwrap();
        let (id, outbound, mut rx) = connection(&server, "a");

        server.handle(&id, &outbound, Message::request(Topic::from(1u32), 1, "")).await;
        assert_eq!(decode(rx.recv().await.unwrap()), Message::ok(1, "second"));
    }

    #[tokio::test]
    async fn test_json_request_with_bad_payload_gets_400() {
        let server = Server::new();
        server
            .on_request_json(1, |value: u32| async move { Ok(value + 1) })
            .unwrap();
        let (id, outbound, mut rx) = connection(&server, "a");

        server.handle(&id, &outbound, Message::request(Topic::from(1u32), 1, "41")).await;
        server.handle(&id, &outbound, Message::request(Topic::from(1u32), 2, "nope")).await;

        assert_eq!(decode(rx.recv().await.unwrap()), Message::ok(1, "42"));
        let Message::Response { status, .. } = decode(rx.recv().await.unwrap()) else {
            panic!("Expected a response");
        };
        assert_eq!(status, RequestError::BAD_PAYLOAD);
    }

    #[tokio::test]
    async fn test_message_handlers_all_run() {
        let server = Server::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();
        server.on_message("chat", move |p| a.lock().unwrap().push(format!("a:{p}"))).unwrap();
        server.on_message("chat", |_| panic!("boom")).unwrap();
        let id_b = server.on_message("chat", move |p| b.lock().unwrap().push(format!("b:{p}"))).unwrap();
        let (id, outbound, _rx) = connection(&server, "a");

        server.handle(&id, &outbound, Message::send(topic("chat"), "hi")).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a:hi", "b:hi"]);

        assert!(server.off_message(&topic("chat"), id_b));
        assert!(!server.off_message(&topic("chat"), id_b));
        server.handle(&id, &outbound, Message::send(topic("chat"), "again")).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_push_skips_failed_connections() {
        let server = Server::new();
        let (a, out_a, mut rx_a) = connection(&server, "a");
        let (b, out_b, rx_b) = connection(&server, "b");
        let (c, out_c, mut rx_c) = connection(&server, "c");
        for (id, outbound) in [(&a, &out_a), (&b, &out_b), (&c, &out_c)] {
            server.handle(id, outbound, Message::subscribe(topic("news"), 1)).await;
        }
        rx_a.recv().await.unwrap();
        rx_c.recv().await.unwrap();

        // The second subscriber's writer is gone.
        drop(rx_b);

        assert_eq!(server.push("news", r#"{"foo":"bar"}"#).unwrap(), 2);
        let expected = Message::send(topic("news"), r#"{"foo":"bar"}"#);
        assert_eq!(decode(rx_a.recv().await.unwrap()), expected);
        assert_eq!(decode(rx_c.recv().await.unwrap()), expected);

        assert_eq!(server.push("empty", "x").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_push_rejects_oversized_record() {
        let server = Server::with_limits(LimitsConfig {
            max_frame_size: 16,
            ..LimitsConfig::default()
        });
        let (id, outbound, _rx) = connection(&server, "a");
        server.handle(&id, &outbound, Message::subscribe(topic("news"), 1)).await;

        assert!(matches!(
            server.push("news", "x".repeat(64)),
            Err(ServerError::Protocol(_))
        ));
    }

    #[test]
    fn test_connection_limit_counts_reserved_slots() {
        let server = Server::with_limits(LimitsConfig {
            max_connections: 2,
            ..LimitsConfig::default()
        });

        let first = server.reserve().unwrap();
        let second = server.reserve().unwrap();
        assert!(server.reserve().is_none());

        drop(first);
        assert!(server.reserve().is_some());
        drop(second);
        assert_eq!(server.inner.accepted.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_end_connection() {
        let server = Server::new();
        let (local, remote) = tokio::io::duplex(1024);
        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.serve_connection(remote, None).await })
        };

        let (outbound, mut inbound) = Connection::new(local, None, 1024).into_parts();
        let mut frame = BytesMut::new();
        frame.extend_from_slice(&5u32.to_be_bytes());
        frame.extend_from_slice(b"#junk");
        outbound.send_raw(frame.freeze()).unwrap();
        outbound.send(&Message::request(topic("nope"), 7, "x")).unwrap();

        let Some(Received::Message(Message::Response { request_id, status, .. })) =
            inbound.recv().await.unwrap()
        else {
            panic!("Expected a response");
        };
        assert_eq!(request_id, 7);
        assert_eq!(status, RequestError::NO_HANDLER);
        assert_eq!(server.connection_count(), 1);

        drop(outbound);
        serving.await.unwrap();
        assert_eq!(server.connection_count(), 0);
    }
}
