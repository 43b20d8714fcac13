//! Codec for encoding and decoding nanolink records.
//!
//! This module handles the textual record grammar only. Splitting a byte
//! stream into records is the job of [`crate::framer`].

use std::fmt::Write;

use thiserror::Error;

use crate::message::{Kind, Message, FIELD_SEPARATOR};
use crate::topic::Topic;

/// Protocol errors that can occur during framing or decoding.
///
/// None of these are fatal to a connection: the offending record is dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds the configured maximum size.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared or encoded frame size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The stream ended in the middle of a frame.
    #[error("Truncated frame: {0} bytes left at end of stream")]
    Truncated(usize),

    /// Framed record was empty.
    #[error("Empty record")]
    Empty,

    /// First character is not a known sigil.
    #[error("Unknown record kind {0:?}")]
    UnknownKind(char),

    /// A required field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Request ID is not a non-negative integer.
    #[error("Invalid request id: {0:?}")]
    InvalidRequestId(String),

    /// Status code is not a non-negative integer.
    #[error("Invalid status code: {0:?}")]
    InvalidStatus(String),

    /// Topic failed validation.
    #[error("Invalid topic: {0}")]
    InvalidTopic(&'static str),

    /// Record bytes are not valid UTF-8.
    #[error("Record is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

/// Encode a record to its textual form.
#[must_use]
pub fn encode(message: &Message) -> String {
    let mut out = String::new();
    encode_into(message, &mut out);
    out
}

/// Encode a record into an existing string buffer.
pub fn encode_into(message: &Message, out: &mut String) {
    out.push(message.kind().sigil());
    // Writing into a String cannot fail.
    let _ = match message {
        Message::Send { topic, payload } => write!(out, "{topic}{FIELD_SEPARATOR}{payload}"),
        Message::Request {
            topic,
            request_id,
            payload,
        } => write!(
            out,
            "{topic}{FIELD_SEPARATOR}{request_id}{FIELD_SEPARATOR}{payload}"
        ),
        Message::Response {
            request_id,
            status,
            payload,
        } => write!(
            out,
            "{request_id}{FIELD_SEPARATOR}{status}{FIELD_SEPARATOR}{payload}"
        ),
        Message::Subscribe { topic, request_id } => {
            write!(out, "{topic}{FIELD_SEPARATOR}{request_id}")
        }
        Message::Unsubscribe { topic } => write!(out, "{topic}"),
    };
}

/// Decode a record from raw framed bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or the record is malformed.
pub fn decode_bytes(data: &[u8]) -> Result<Message, ProtocolError> {
    decode(std::str::from_utf8(data)?)
}

/// Decode a record from its textual form.
///
/// # Errors
///
/// Returns an error for an empty record, an unknown sigil, missing fields,
/// non-numeric IDs or status codes, or an invalid topic.
pub fn decode(record: &str) -> Result<Message, ProtocolError> {
    let mut chars = record.chars();
    let sigil = chars.next().ok_or(ProtocolError::Empty)?;
    let kind = Kind::try_from(sigil).map_err(ProtocolError::UnknownKind)?;
    let body = chars.as_str();

    match kind {
        Kind::Send => {
            let (topic, payload) = body
                .split_once(FIELD_SEPARATOR)
                .ok_or(ProtocolError::MissingField("payload"))?;
            Ok(Message::Send {
                topic: Topic::new(topic)?,
                payload: payload.to_string(),
            })
        }
        Kind::Request => {
            let mut fields = body.splitn(3, FIELD_SEPARATOR);
            let topic = fields.next().unwrap_or_default();
            let request_id = fields.next().ok_or(ProtocolError::MissingField("request id"))?;
            let payload = fields.next().ok_or(ProtocolError::MissingField("payload"))?;
            Ok(Message::Request {
                topic: Topic::new(topic)?,
                request_id: parse_request_id(request_id)?,
                payload: payload.to_string(),
            })
        }
        Kind::Response => {
            let mut fields = body.splitn(3, FIELD_SEPARATOR);
            let request_id = fields.next().unwrap_or_default();
            let status = fields.next().ok_or(ProtocolError::MissingField("status code"))?;
            let payload = fields.next().ok_or(ProtocolError::MissingField("payload"))?;
            Ok(Message::Response {
                request_id: parse_request_id(request_id)?,
                status: status
                    .parse()
                    .map_err(|_| ProtocolError::InvalidStatus(status.to_string()))?,
                payload: payload.to_string(),
            })
        }
        Kind::Subscribe => {
            let (topic, request_id) = body
                .split_once(FIELD_SEPARATOR)
                .ok_or(ProtocolError::MissingField("request id"))?;
            Ok(Message::Subscribe {
                topic: Topic::new(topic)?,
                request_id: parse_request_id(request_id)?,
            })
        }
        Kind::Unsubscribe => Ok(Message::Unsubscribe {
            topic: Topic::new(body)?,
        }),
    }
}

fn parse_request_id(field: &str) -> Result<u64, ProtocolError> {
    field
        .parse()
        .map_err(|_| ProtocolError::InvalidRequestId(field.to_string()))
}
