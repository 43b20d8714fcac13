//! Correlation of request IDs with pending continuations.
//!
//! One table serves both request/response and subscribe acknowledgments:
//! what happens on resolution depends only on the continuation the caller
//! registered. Every entry is resolved at most once and then removed.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{ReplyError, RequestError};

/// The outcome delivered to a continuation.
pub type Reply = Result<String, ReplyError>;

/// A suspended caller's resolution handler.
pub type Continuation = Box<dyn FnOnce(Reply) + Send + Sync>;

/// Per-connection table of pending requests.
pub struct RequestTable {
    /// Next request ID to hand out; IDs start at 1 and are never reused.
    next_id: AtomicU64,
    /// Pending continuations by request ID.
    pending: DashMap<u64, Continuation>,
}

impl RequestTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate the next request ID.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a continuation for a request ID.
    ///
    /// Registering twice for the same ID replaces the earlier continuation.
    pub fn register(&self, request_id: u64, continuation: impl FnOnce(Reply) + Send + Sync + 'static) {
        self.pending.insert(request_id, Box::new(continuation));
    }

    /// Register a continuation that forwards the reply to a oneshot channel.
    pub fn register_oneshot(&self, request_id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.register(request_id, move |reply| {
            // The caller may have stopped waiting.
            let _ = tx.send(reply);
        });
        rx
    }

    /// Resolve a pending request with a successful payload.
    ///
    /// Returns `false` if no entry was pending for the ID.
    pub fn resolve(&self, request_id: u64, payload: String) -> bool {
        self.complete(request_id, Ok(payload))
    }

    /// Reject a pending request.
    ///
    /// Returns `false` if no entry was pending for the ID.
    pub fn reject(&self, request_id: u64, error: impl Into<ReplyError>) -> bool {
        self.complete(request_id, Err(error.into()))
    }

    /// Resolve or reject from a Response record's status and payload.
    pub fn settle(&self, request_id: u64, status: u32, payload: String) -> bool {
        if status == nanolink_protocol::STATUS_OK {
            self.resolve(request_id, payload)
        } else {
            self.reject(request_id, RequestError::new(status, payload))
        }
    }

    fn complete(&self, request_id: u64, reply: Reply) -> bool {
        // The entry leaves the map before the continuation runs.
        match self.pending.remove(&request_id) {
            Some((_, continuation)) => {
                continuation(reply);
                true
            }
            None => {
                trace!(request_id, "No pending entry for reply");
                false
            }
        }
    }

    /// Drop a pending entry without invoking it.
    ///
    /// Idempotent: returns `false` if the entry was already gone.
    pub fn remove(&self, request_id: u64) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    /// Reject every pending entry with the same error.
    ///
    /// Returns the number of entries rejected.
    pub fn reject_all(&self, error: ReplyError) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter(|id| self.reject(*id, error.clone()))
            .count()
    }

    /// Check if a request ID is pending.
    #[must_use]
    pub fn contains(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for RequestTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTable")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Removes a pending entry when dropped.
///
/// Held by a caller suspended on a reply, so that abandoning the wait (for
/// example under an external timeout) leaves no stale continuation behind.
pub struct PendingGuard<'a> {
    table: &'a RequestTable,
    request_id: u64,
}

impl<'a> PendingGuard<'a> {
    /// Guard the entry for `request_id`.
    #[must_use]
    pub fn new(table: &'a RequestTable, request_id: u64) -> Self {
        Self { table, request_id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let table = RequestTable::new();
        assert_eq!(table.next_id(), 1);
        assert_eq!(table.next_id(), 2);
        assert_eq!(table.next_id(), 3);
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let table = RequestTable::new();
        let rx = table.register_oneshot(1);

        assert!(table.resolve(1, "done".into()));
        assert!(!table.resolve(1, "again".into()));
        assert_eq!(rx.await.unwrap(), Ok("done".to_string()));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_settle_nonzero_status_rejects() {
        let table = RequestTable::new();
        let rx = table.register_oneshot(7);

        assert!(table.settle(7, 13, "bad thing".into()));
        assert_eq!(
            rx.await.unwrap(),
            Err(ReplyError::Rejected(RequestError::new(13, "bad thing")))
        );
    }

    #[test]
    fn test_unknown_reply_is_ignored() {
        let table = RequestTable::new();
        assert!(!table.resolve(99, String::new()));
        assert!(!table.reject(99, ReplyError::Disconnected));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let table = RequestTable::new();
        let counter = calls.clone();
        table.register(4, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(table.remove(4));
        assert!(!table.remove(4));
        assert!(!table.resolve(4, String::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let table = RequestTable::new();
        let _rx = table.register_oneshot(5);
        {
            let _guard = PendingGuard::new(&table, 5);
            assert!(table.contains(5));
        }
        assert!(!table.contains(5));
    }

    #[tokio::test]
    async fn test_reject_all() {
        let table = RequestTable::new();
        let rx1 = table.register_oneshot(1);
        let rx2 = table.register_oneshot(2);

        assert_eq!(table.reject_all(ReplyError::Disconnected), 2);
        assert_eq!(rx1.await.unwrap(), Err(ReplyError::Disconnected));
        assert_eq!(rx2.await.unwrap(), Err(ReplyError::Disconnected));
        assert!(table.is_empty());
    }
}
