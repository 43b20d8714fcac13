//! Client-side subscription registry.
//!
//! Tracks the local handlers for each topic and derives the wire-level
//! transitions from handler counts: a Subscribe record is announced only when
//! a topic goes from zero to one handler, and an Unsubscribe record only when
//! it goes from one to zero. Everything else is local bookkeeping.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use nanolink_protocol::Topic;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::handlers::{HandlerId, HandlerSet, MessageHandler};

/// The subscription was torn down before the server acknowledged it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Subscription dropped before acknowledgment")]
pub struct AckDropped;

/// Completes the acknowledgment of a topic subscription.
#[derive(Debug, Clone)]
pub struct AckSignal(Arc<watch::Sender<bool>>);

impl AckSignal {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }

    /// Mark the topic as acknowledged, releasing every waiting subscriber.
    pub fn ack(&self) {
        self.0.send_replace(true);
    }

    /// Check if the topic has been acknowledged.
    #[must_use]
    pub fn is_acked(&self) -> bool {
        *self.0.borrow()
    }
}

/// A handler that has been registered locally and may still be waiting for
/// the server's acknowledgment.
#[derive(Debug)]
pub struct PendingSubscription {
    handler_id: HandlerId,
    announced: bool,
    ack: watch::Receiver<bool>,
}

impl PendingSubscription {
    /// Identifier of the registered handler.
    #[must_use]
    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    /// Whether this call announced the topic to the server.
    #[must_use]
    pub fn announced(&self) -> bool {
        self.announced
    }

    /// Wait until the topic is acknowledged.
    ///
    /// Returns immediately if it already is.
    ///
    /// # Errors
    ///
    /// Returns [`AckDropped`] if the topic entry was cleared while waiting.
    pub async fn acknowledged(mut self) -> Result<HandlerId, AckDropped> {
        self.ack
            .wait_for(|acked| *acked)
            .await
            .map(|_| self.handler_id)
            .map_err(|_| AckDropped)
    }
}

struct TopicEntry {
    handlers: HandlerSet<MessageHandler>,
    ack: AckSignal,
}

/// Per-topic handler sets with ref-counted wire registration.
#[derive(Default)]
pub struct SubscriptionRegistry {
    topics: DashMap<Topic, TopicEntry>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a topic.
    ///
    /// For the first handler of a topic, `announce` is called with the
    /// topic's [`AckSignal`] while the topic is locked; it is expected to
    /// send the Subscribe record. If it fails, the handler is not added and
    /// the error is returned. Later handlers attach to the existing entry,
    /// whether or not it has been acknowledged yet.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `announce`.
    pub fn subscribe<E>(
        &self,
        topic: &Topic,
        handler: MessageHandler,
        announce: impl FnOnce(&AckSignal) -> Result<(), E>,
    ) -> Result<PendingSubscription, E> {
        match self.topics.entry(topic.clone()) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                let handler_id = entry.handlers.insert(handler);
                debug!(topic = %topic, handlers = entry.handlers.len(), "Handler attached");
                Ok(PendingSubscription {
                    handler_id,
                    announced: false,
                    ack: entry.ack.0.subscribe(),
                })
            }
            Entry::Vacant(slot) => {
                let ack = AckSignal::new();
                announce(&ack)?;

                let mut handlers = HandlerSet::new();
                let handler_id = handlers.insert(handler);
                let receiver = ack.0.subscribe();
                slot.insert(TopicEntry { handlers, ack });
                debug!(topic = %topic, "Topic announced");

                Ok(PendingSubscription {
                    handler_id,
                    announced: true,
                    ack: receiver,
                })
            }
        }
    }

    /// Remove a handler from a topic.
    ///
    /// When the last handler goes, the topic is dropped and `retire` is
    /// called while the topic is locked; it is expected to send the
    /// Unsubscribe record. Returns `true` if the handler was registered.
    pub fn unsubscribe(&self, topic: &Topic, handler_id: HandlerId, retire: impl FnOnce()) -> bool {
        let Entry::Occupied(mut entry) = self.topics.entry(topic.clone()) else {
            return false;
        };

        if !entry.get_mut().handlers.remove(handler_id) {
            return false;
        }

        if entry.get().handlers.is_empty() {
            retire();
            entry.remove();
            debug!(topic = %topic, "Topic retired");
        }
        true
    }

    /// Snapshot of the handlers registered for a topic.
    #[must_use]
    pub fn handlers(&self, topic: &Topic) -> Vec<MessageHandler> {
        self.topics
            .get(topic)
            .map(|entry| entry.handlers.snapshot())
            .unwrap_or_default()
    }

    /// Number of handlers registered for a topic.
    #[must_use]
    pub fn handler_count(&self, topic: &Topic) -> usize {
        self.topics
            .get(topic)
            .map(|entry| entry.handlers.len())
            .unwrap_or(0)
    }

    /// Check if the server has acknowledged a topic.
    #[must_use]
    pub fn is_acked(&self, topic: &Topic) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|entry| entry.ack.is_acked())
    }

    /// Announce every registered topic again, e.g. after a reconnect.
    ///
    /// Returns the number of topics announced.
    pub fn reannounce(&self, mut announce: impl FnMut(&Topic, &AckSignal)) -> usize {
        let mut count = 0;
        for entry in self.topics.iter() {
            announce(entry.key(), &entry.value().ack);
            count += 1;
        }
        count
    }

    /// All topics with at least one handler.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop every topic; subscribers still waiting for an acknowledgment
    /// fail with [`AckDropped`].
    pub fn clear(&self) {
        self.topics.clear();
    }

    /// Drop every topic the server has not acknowledged yet.
    ///
    /// Their waiting subscribers fail with [`AckDropped`]; acknowledged
    /// topics are kept. Returns the number of topics dropped.
    pub fn drop_unacknowledged(&self) -> usize {
        let mut dropped = 0;
        self.topics.retain(|topic, entry| {
            if entry.ack.is_acked() {
                return true;
            }
            debug!(topic = %topic, "Dropping unacknowledged topic");
            dropped += 1;
            false
        });
        dropped
    }

    /// Check if no topics are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("topics", &self.topics.len())
            .finish()
    }
}
