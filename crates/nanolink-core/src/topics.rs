//! Server-side topic registry.
//!
//! Maps each topic to the set of connections subscribed to it, and each
//! connection back to its topics so that a closing connection can be purged
//! from everything it joined.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use dashmap::{DashMap, DashSet};
use nanolink_protocol::Topic;
use tracing::{debug, trace};

/// Topic registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicStats {
    /// Number of topics with at least one subscriber.
    pub topic_count: usize,
    /// Number of connections with at least one subscription.
    pub connection_count: usize,
    /// Total number of (topic, connection) subscriptions.
    pub total_subscriptions: usize,
}

/// Topic to subscriber-set mapping, keyed by connection identity `C`.
///
/// Every mutation of one topic's set happens under that topic's map lock,
/// so concurrent connections never interleave inside a single set.
pub struct TopicRegistry<C> {
    /// Subscribers indexed by topic.
    subscribers: DashMap<Topic, HashSet<C>>,
    /// Topics indexed by connection.
    memberships: DashMap<C, DashSet<Topic>>,
}

impl<C> TopicRegistry<C>
where
    C: Clone + Eq + Hash + Display,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Subscribe a connection to a topic.
    ///
    /// Returns `false` if the connection was already subscribed.
    pub fn subscribe(&self, connection: &C, topic: &Topic) -> bool {
        let added = self
            .subscribers
            .entry(topic.clone())
            .or_default()
            .insert(connection.clone());

        if added {
            self.memberships
                .entry(connection.clone())
                .or_default()
                .insert(topic.clone());
            debug!(topic = %topic, connection = %connection, "Subscribed");
        }
        added
    }

    /// Unsubscribe a connection from a topic.
    ///
    /// Returns `false` if the connection was not subscribed.
    pub fn unsubscribe(&self, connection: &C, topic: &Topic) -> bool {
        if !self.remove_subscriber(connection, topic) {
            return false;
        }

        if let Some(topics) = self.memberships.get(connection) {
            topics.remove(topic);
        }
        self.memberships.remove_if(connection, |_, topics| topics.is_empty());

        debug!(topic = %topic, connection = %connection, "Unsubscribed");
        true
    }

    /// Unsubscribe a connection from all topics.
    ///
    /// Returns the number of topics the connection was removed from.
    pub fn unsubscribe_all(&self, connection: &C) -> usize {
        let Some((_, topics)) = self.memberships.remove(connection) else {
            return 0;
        };

        let count = topics
            .iter()
            .filter(|topic| self.remove_subscriber(connection, topic))
            .count();

        debug!(connection = %connection, topics = count, "Unsubscribed from all topics");
        count
    }

    /// Remove a connection from one topic set, deleting the set if empty.
    fn remove_subscriber(&self, connection: &C, topic: &Topic) -> bool {
        let removed = match self.subscribers.get_mut(topic) {
            Some(mut set) => set.remove(connection),
            None => false,
        };

        if removed
            && self
                .subscribers
                .remove_if(topic, |_, set| set.is_empty())
                .is_some()
        {
            trace!(topic = %topic, "Deleted empty topic");
        }
        removed
    }

    /// Snapshot of the connections subscribed to a topic.
    #[must_use]
    pub fn subscribers(&self, topic: &Topic) -> Vec<C> {
        self.subscribers
            .get(topic)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of subscribers for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.subscribers.get(topic).map(|set| set.len()).unwrap_or(0)
    }

    /// Check if a connection is subscribed to a topic.
    #[must_use]
    pub fn is_subscribed(&self, connection: &C, topic: &Topic) -> bool {
        self.subscribers
            .get(topic)
            .is_some_and(|set| set.contains(connection))
    }

    /// Topics a connection is subscribed to.
    #[must_use]
    pub fn connection_topics(&self, connection: &C) -> Vec<Topic> {
        self.memberships
            .get(connection)
            .map(|topics| topics.iter().map(|t| t.clone()).collect())
            .unwrap_or_default()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> TopicStats {
        TopicStats {
            topic_count: self.subscribers.len(),
            connection_count: self.memberships.len(),
            total_subscriptions: self.subscribers.iter().map(|s| s.len()).sum(),
        }
    }
}

impl<C> Default for TopicRegistry<C>
where
    C: Clone + Eq + Hash + Display,
{
    fn default() -> Self {
        Self::new()
    }
}
