//! Topic keys.
//!
//! A topic names a message stream for send, request and subscribe records.
//! Topics are chosen by the application and may be strings or integers; on
//! the wire they are always rendered as text.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::ProtocolError;
use crate::message::FIELD_SEPARATOR;

/// Maximum topic length in bytes.
pub const MAX_TOPIC_LENGTH: usize = 256;

/// Validate a topic key.
///
/// # Errors
///
/// Returns an error message if the topic is empty, too long, or contains the
/// field separator or control characters.
pub fn validate_topic(topic: &str) -> Result<(), &'static str> {
    if topic.is_empty() {
        return Err("Topic cannot be empty");
    }
    if topic.len() > MAX_TOPIC_LENGTH {
        return Err("Topic too long");
    }
    if topic.contains(FIELD_SEPARATOR) {
        return Err("Topic cannot contain the field separator '|'");
    }
    if topic.chars().any(|c| c.is_control()) {
        return Err("Topic contains control characters");
    }
    Ok(())
}

/// A validated topic key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Create a topic, validating it first.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTopic`] if the key is not a valid topic.
    pub fn new(topic: impl Into<String>) -> Result<Self, ProtocolError> {
        let topic = topic.into();
        validate_topic(&topic).map_err(ProtocolError::InvalidTopic)?;
        Ok(Self(topic))
    }

    /// Get the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> String {
        topic.0
    }
}

impl TryFrom<String> for Topic {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Topic::new(value)
    }
}

impl TryFrom<&str> for Topic {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Topic::new(value)
    }
}

macro_rules! integer_topics {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Topic {
                fn from(value: $ty) -> Self {
                    // Decimal digits and '-' never violate topic rules.
                    Topic(value.to_string())
                }
            }
        )*
    };
}

integer_topics!(u8, u16, u32, u64, usize, i32, i64);

/// Conversion into a [`Topic`], accepting both string and integer keys.
///
/// Engine operations take `impl IntoTopic` so callers can write
/// `client.send(1, ..)` as well as `client.send("chat", ..)`.
pub trait IntoTopic {
    /// Convert into a validated topic.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTopic`] for invalid string keys.
    fn into_topic(self) -> Result<Topic, ProtocolError>;
}

impl IntoTopic for Topic {
    fn into_topic(self) -> Result<Topic, ProtocolError> {
        Ok(self)
    }
}

impl IntoTopic for &Topic {
    fn into_topic(self) -> Result<Topic, ProtocolError> {
        Ok(self.clone())
    }
}

impl IntoTopic for &str {
    fn into_topic(self) -> Result<Topic, ProtocolError> {
        Topic::new(self)
    }
}

impl IntoTopic for String {
    fn into_topic(self) -> Result<Topic, ProtocolError> {
        Topic::new(self)
    }
}

impl IntoTopic for &String {
    fn into_topic(self) -> Result<Topic, ProtocolError> {
        Topic::new(self.as_str())
    }
}

macro_rules! integer_into_topic {
    ($($ty:ty),*) => {
        $(
            impl IntoTopic for $ty {
                fn into_topic(self) -> Result<Topic, ProtocolError> {
                    Ok(Topic::from(self))
                }
            }
        )*
    };
}

integer_into_topic!(u8, u16, u32, u64, usize, i32, i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_validation() {
        assert!(validate_topic("chat:lobby").is_ok());
        assert!(validate_topic("1").is_ok());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("a|b").is_err());
        assert!(validate_topic("line\nbreak").is_err());

        let long = "t".repeat(MAX_TOPIC_LENGTH + 1);
        assert!(validate_topic(&long).is_err());
    }

    #[test]
    fn test_integer_topics() {
        assert_eq!(Topic::from(1u32).as_str(), "1");
        assert_eq!(Topic::from(-7i64).as_str(), "-7");
        assert_eq!(42u64.into_topic().unwrap(), Topic::new("42").unwrap());
    }

    #[test]
    fn test_invalid_topic_error() {
        match "".into_topic() {
            Err(ProtocolError::InvalidTopic(_)) => {}
            other => panic!("Expected InvalidTopic, got {:?}", other),
        }
    }

    #[test]
    fn test_topic_deserialize_validates() {
        let ok: Result<Topic, _> = serde_json::from_str("\"news\"");
        assert!(ok.is_ok());
        let bad: Result<Topic, _> = serde_json::from_str("\"a|b\"");
        assert!(bad.is_err());
    }
}
