//! Message records for the nanolink protocol.
//!
//! A record is one complete protocol unit. Its first character (the sigil)
//! names the kind; the remaining fields are separated by `|`.

use crate::topic::Topic;

/// Field separator within one record.
pub const FIELD_SEPARATOR: char = '|';

/// Status code signalling a successful response.
pub const STATUS_OK: u32 = 0;

/// Record kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Fire-and-forget message, either direction.
    Send,
    /// Correlated request, client to server.
    Request,
    /// Response or acknowledgment, server to client.
    Response,
    /// Topic registration, client to server.
    Subscribe,
    /// Topic deregistration, client to server.
    Unsubscribe,
}

impl Kind {
    /// The sigil that starts a record of this kind.
    #[must_use]
    pub const fn sigil(self) -> char {
        match self {
            Kind::Send => '!',
            Kind::Request => '?',
            Kind::Response => '<',
            Kind::Subscribe => '+',
            Kind::Unsubscribe => '-',
        }
    }
}

impl From<Kind> for char {
    fn from(kind: Kind) -> char {
        kind.sigil()
    }
}

impl TryFrom<char> for Kind {
    type Error = char;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            '!' => Ok(Kind::Send),
            '?' => Ok(Kind::Request),
            '<' => Ok(Kind::Response),
            '+' => Ok(Kind::Subscribe),
            '-' => Ok(Kind::Unsubscribe),
            other => Err(other),
        }
    }
}

/// A protocol record.
///
/// Payloads are opaque text; the engine never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `!<topic>|<payload>`
    Send {
        /// Target topic.
        topic: Topic,
        /// Serialized payload.
        payload: String,
    },

    /// `?<topic>|<requestId>|<payload>`
    Request {
        /// Target topic.
        topic: Topic,
        /// Correlation ID, echoed by the response.
        request_id: u64,
        /// Serialized payload.
        payload: String,
    },

    /// `<<requestId>|<statusCode>|<payload>`
    Response {
        /// ID of the request or subscribe being answered.
        request_id: u64,
        /// `0` for success, otherwise an application-defined code.
        status: u32,
        /// Result on success, error text on failure.
        payload: String,
    },

    /// `+<topic>|<requestId>`
    Subscribe {
        /// Topic to subscribe to.
        topic: Topic,
        /// Correlation ID for the acknowledgment.
        request_id: u64,
    },

    /// `-<topic>`
    Unsubscribe {
        /// Topic to unsubscribe from.
        topic: Topic,
    },
}

impl Message {
    /// Get the record kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Message::Send { .. } => Kind::Send,
            Message::Request { .. } => Kind::Request,
            Message::Response { .. } => Kind::Response,
            Message::Subscribe { .. } => Kind::Subscribe,
            Message::Unsubscribe { .. } => Kind::Unsubscribe,
        }
    }

    /// Get the topic, if the record carries one.
    #[must_use]
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Message::Send { topic, .. }
            | Message::Request { topic, .. }
            | Message::Subscribe { topic, .. }
            | Message::Unsubscribe { topic } => Some(topic),
            Message::Response { .. } => None,
        }
    }

    /// Get the request ID, if the record carries one.
    #[must_use]
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Message::Request { request_id, .. }
            | Message::Response { request_id, .. }
            | Message::Subscribe { request_id, .. } => Some(*request_id),
            Message::Send { .. } | Message::Unsubscribe { .. } => None,
        }
    }

    /// Create a new Send record.
    #[must_use]
    pub fn send(topic: Topic, payload: impl Into<String>) -> Self {
        Message::Send {
            topic,
            payload: payload.into(),
        }
    }

    /// Create a new Request record.
    #[must_use]
    pub fn request(topic: Topic, request_id: u64, payload: impl Into<String>) -> Self {
        Message::Request {
            topic,
            request_id,
            payload: payload.into(),
        }
    }

    /// Create a successful Response record.
    #[must_use]
    pub fn ok(request_id: u64, payload: impl Into<String>) -> Self {
        Message::Response {
            request_id,
            status: STATUS_OK,
            payload: payload.into(),
        }
    }

    /// Create a failed Response record.
    #[must_use]
    pub fn error(request_id: u64, status: u32, message: impl Into<String>) -> Self {
        Message::Response {
            request_id,
            status,
            payload: message.into(),
        }
    }

    /// Create a subscribe acknowledgment.
    #[must_use]
    pub fn ack(request_id: u64) -> Self {
        Message::ok(request_id, String::new())
    }

    /// Create a new Subscribe record.
    #[must_use]
    pub fn subscribe(topic: Topic, request_id: u64) -> Self {
        Message::Subscribe { topic, request_id }
    }

    /// Create a new Unsubscribe record.
    #[must_use]
    pub fn unsubscribe(topic: Topic) -> Self {
        Message::Unsubscribe { topic }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(Message::send(topic("a"), "x").kind(), Kind::Send);
        assert_eq!(Message::ack(3).kind(), Kind::Response);
        assert_eq!(Message::unsubscribe(topic("a")).kind(), Kind::Unsubscribe);
    }

    #[test]
    fn test_sigil_conversion() {
        for kind in [
            Kind::Send,
            Kind::Request,
            Kind::Response,
            Kind::Subscribe,
            Kind::Unsubscribe,
        ] {
            assert_eq!(Kind::try_from(kind.sigil()), Ok(kind));
        }
        assert_eq!(Kind::try_from('#'), Err('#'));
    }

    #[test]
    fn test_accessors() {
        let request = Message::request(topic("rpc"), 9, "{}");
        assert_eq!(request.topic(), Some(&topic("rpc")));
        assert_eq!(request.request_id(), Some(9));

        let response = Message::error(9, 7, "nope");
        assert_eq!(response.topic(), None);
        assert_eq!(response.request_id(), Some(9));
    }
}
