//! Length-prefixed framing for byte-stream transports.
//!
//! TCP does not preserve write boundaries, so every record is written as:
//! - 4 bytes: Big-endian length prefix
//! - N bytes: UTF-8 record text
//!
//! The framer is restartable: feed it whatever bytes have arrived and call
//! [`Framer::decode_from`] until it returns `Ok(None)`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{self, ProtocolError};
use crate::message::Message;

/// Default maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Streaming frame encoder/decoder for one connection direction.
#[derive(Debug, Clone)]
pub struct Framer {
    max_frame_size: usize,
    /// Bytes of an oversized frame still to be skipped.
    discarding: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Framer {
    /// Create a framer with the given maximum frame size.
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(u32::MAX as usize),
            discarding: 0,
        }
    }

    /// Get the maximum frame size.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a record into a framed buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoded record exceeds the maximum frame size.
    pub fn encode(&self, message: &Message) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::new();
        self.encode_into(message, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode a record into an existing buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoded record exceeds the maximum frame size.
    pub fn encode_into(&self, message: &Message, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let record = codec::encode(message);

        if record.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: record.len(),
                max: self.max_frame_size,
            });
        }

        buf.reserve(LENGTH_PREFIX_SIZE + record.len());
        buf.put_u32(record.len() as u32);
        buf.extend_from_slice(record.as_bytes());

        Ok(())
    }

    /// Try to take one complete record from the buffer, advancing it.
    ///
    /// Returns `Ok(Some(record))` if a complete frame was available and
    /// `Ok(None)` if more data is needed. An oversized frame yields
    /// [`ProtocolError::FrameTooLarge`] once; its body is then skipped as it
    /// arrives and decoding continues with the following frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the next frame declares a length above the maximum.
    pub fn decode_from(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
        if self.discarding > 0 {
            let skip = self.discarding.min(buf.len());
            buf.advance(skip);
            self.discarding -= skip;
            if self.discarding > 0 {
                return Ok(None);
            }
        }

        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

        if length > self.max_frame_size {
            buf.advance(LENGTH_PREFIX_SIZE);
            self.discarding = length;
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            });
        }

        let total_size = LENGTH_PREFIX_SIZE + length;
        if buf.len() < total_size {
            buf.reserve(total_size - buf.len());
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(buf.split_to(length).freeze()))
    }

    /// Check the buffer once the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] if a partial frame is left over.
    pub fn finish(&mut self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let leftover = buf.len() + self.discarding;
        let truncated = !buf.is_empty() || self.discarding > 0;
        buf.clear();
        self.discarding = 0;
        if truncated {
            return Err(ProtocolError::Truncated(leftover));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::Topic;

    fn send(topic: &str, payload: &str) -> Message {
        Message::send(Topic::new(topic).unwrap(), payload)
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut framer = Framer::default();
        let encoded = framer.encode(&send("t", "hello")).unwrap();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encoded[..3]);
        assert!(framer.decode_from(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&encoded[3..7]);
        assert!(framer.decode_from(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&encoded[7..]);
        let record = framer.decode_from(&mut buf).unwrap().unwrap();
        assert_eq!(&record[..], b"!t|hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut framer = Framer::default();
        let mut buf = BytesMut::new();
        framer.encode_into(&send("a", "first"), &mut buf).unwrap();
        framer.encode_into(&send("b", "second"), &mut buf).unwrap();

        let first = framer.decode_from(&mut buf).unwrap().unwrap();
        let second = framer.decode_from(&mut buf).unwrap().unwrap();
        assert_eq!(&first[..], b"!a|first");
        assert_eq!(&second[..], b"!b|second");
        assert!(framer.decode_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_too_large() {
        let framer = Framer::new(8);
        match framer.encode(&send("t", "way too long")) {
            Err(ProtocolError::FrameTooLarge { max: 8, .. }) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_frame_is_skipped() {
        let big = Framer::default();
        let mut framer = Framer::new(16);

        let mut buf = BytesMut::new();
        big.encode_into(&send("t", &"x".repeat(64)), &mut buf).unwrap();
        big.encode_into(&send("t", "ok"), &mut buf).unwrap();

        // Deliver the oversized frame in two pieces.
        let mut first = buf.split_to(20);
        assert!(matches!(
            framer.decode_from(&mut first),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
        assert!(framer.decode_from(&mut first).unwrap().is_none());

        let record = framer.decode_from(&mut buf).unwrap().unwrap();
        assert_eq!(&record[..], b"!t|ok");
    }

    #[test]
    fn test_finish_reports_truncation() {
        let mut framer = Framer::default();
        let encoded = framer.encode(&send("t", "hello")).unwrap();

        let mut buf = BytesMut::from(&encoded[..6]);
        assert!(framer.decode_from(&mut buf).unwrap().is_none());
        assert!(matches!(
            framer.finish(&mut buf),
            Err(ProtocolError::Truncated(6))
        ));

        let mut empty = BytesMut::new();
        assert!(framer.finish(&mut empty).is_ok());
    }
}
