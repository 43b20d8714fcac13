//! Observer registry for topic handlers.
//!
//! Handlers are kept in insertion order. Dispatch always iterates over a
//! snapshot, so handlers added or removed while a record is being delivered
//! do not affect that delivery.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use nanolink_protocol::Topic;
use tracing::warn;

use crate::error::DispatchError;

/// Identifier of a registered handler, unique within its set.
pub type HandlerId = u64;

/// A handler invoked with the raw payload of every Send record on a topic.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Insertion-ordered set of handlers.
pub struct HandlerSet<H> {
    next_id: HandlerId,
    entries: Vec<(HandlerId, H)>,
}

impl<H> HandlerSet<H> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    /// Add a handler, returning its identifier.
    pub fn insert(&mut self, handler: H) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, handler));
        id
    }

    /// Remove a handler.
    ///
    /// Returns `true` if the handler was present.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Clone> HandlerSet<H> {
    /// Copy the current handlers, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<H> {
        self.entries.iter().map(|(_, h)| h.clone()).collect()
    }
}

impl<H> Default for HandlerSet<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for HandlerSet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Invoke every handler with the payload.
///
/// A panicking handler is reported and does not prevent the remaining
/// handlers from running.
pub fn dispatch(topic: &Topic, handlers: &[MessageHandler], payload: &str) -> Vec<DispatchError> {
    let mut failures = Vec::new();
    for handler in handlers {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(payload))) {
            let err = DispatchError::from_panic(topic.clone(), panic);
            warn!(topic = %topic, error = %err, "Message handler failed");
            failures.push(err);
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_insert_remove() {
        let mut set: HandlerSet<&'static str> = HandlerSet::new();
        let a = set.insert("a");
        let b = set.insert("b");
        assert_ne!(a, b);
        assert_eq!(set.len(), 2);

        assert!(set.remove(a));
        assert!(!set.remove(a));
        assert_eq!(set.snapshot(), vec!["b"]);
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let mut set = HandlerSet::new();
        for name in ["first", "second", "third"] {
            set.insert(name);
        }
        assert_eq!(set.snapshot(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_dispatch_isolates_panics() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let seen = seen.clone();
            Arc::new(move |p: &str| seen.lock().unwrap().push(format!("first:{p}"))) as MessageHandler
        };
        let broken = Arc::new(|_: &str| panic!("broken handler")) as MessageHandler;
        let last = {
            let seen = seen.clone();
            Arc::new(move |p: &str| seen.lock().unwrap().push(format!("last:{p}"))) as MessageHandler
        };

        let topic = Topic::new("t").unwrap();
        let failures = dispatch(&topic, &[first, broken, last], "x");

        assert_eq!(failures.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["first:x", "last:x"]);
    }
}
