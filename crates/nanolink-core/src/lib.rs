//! # nanolink-core
//!
//! Connection-scoped state shared by the nanolink client and server engines.
//!
//! - **RequestTable** - request ID allocation and continuation matching
//! - **SubscriptionRegistry** - client handlers with ref-counted registration
//! - **TopicRegistry** - server topic to subscriber-connection mapping
//! - **HandlerSet** - insertion-ordered observers with snapshot dispatch
//! - **ReconnectDelay** - client backoff policy
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!  Response ──────▶│ RequestTable │──▶ continuation (request / subscribe ack)
//!                  └──────────────┘
//!                  ┌──────────────────────┐
//!  Send ──────────▶│ SubscriptionRegistry │──▶ handlers (client)
//!                  └──────────────────────┘
//!                  ┌───────────────┐
//!  push(topic) ───▶│ TopicRegistry │──▶ subscribed connections (server)
//!                  └───────────────┘
//! ```

pub mod backoff;
pub mod error;
pub mod handlers;
pub mod request_table;
pub mod subscriptions;
pub mod topics;

pub use backoff::ReconnectDelay;
pub use error::{DispatchError, ReplyError, RequestError};
pub use handlers::{HandlerId, HandlerSet, MessageHandler};
pub use request_table::{PendingGuard, Reply, RequestTable};
pub use subscriptions::{AckDropped, AckSignal, PendingSubscription, SubscriptionRegistry};
pub use topics::{TopicRegistry, TopicStats};
