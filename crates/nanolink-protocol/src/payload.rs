//! Pluggable payload serialization.
//!
//! Payloads are opaque strings at the wire layer. Callers that want
//! structured values pick a [`PayloadCodec`]; [`Json`] is the default one.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Payload (de)serialization errors.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Value could not be serialized.
    #[error("Payload encoding error: {0}")]
    Encode(String),

    /// Payload text could not be deserialized.
    #[error("Payload decoding error: {0}")]
    Decode(String),
}

/// Converts structured values to and from payload text.
pub trait PayloadCodec {
    /// Serialize a value into payload text.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, PayloadError>;

    /// Deserialize payload text into a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid encoding of `T`.
    fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, PayloadError>;
}

/// JSON payload codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl PayloadCodec for Json {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, PayloadError> {
        serde_json::to_string(value).map_err(|e| PayloadError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, PayloadError> {
        serde_json::from_str(payload).map_err(|e| PayloadError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Foo {
        foo: String,
    }

    #[test]
    fn test_json_codec() {
        let text = Json::encode(&Foo { foo: "bar".into() }).unwrap();
        assert_eq!(text, r#"{"foo":"bar"}"#);

        let value: Foo = Json::decode(&text).unwrap();
        assert_eq!(value.foo, "bar");
    }

    #[test]
    fn test_json_decode_error() {
        let result: Result<Foo, _> = Json::decode("not json");
        assert!(matches!(result, Err(PayloadError::Decode(_))));
    }
}
