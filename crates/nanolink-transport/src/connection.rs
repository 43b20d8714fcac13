//! Framed connections over a byte stream.
//!
//! A connection is split into an [`Inbound`] half that frames and decodes
//! records in arrival order, and an [`Outbound`] handle feeding a dedicated
//! writer task through a queue:
//!
//! ```text
//! Engine ─┐
//! push()  ┼─► mpsc::UnboundedSender<Bytes> ─► Writer Task ─► Stream
//! Engine ─┘
//! ```

use bytes::{Bytes, BytesMut};
use nanolink_protocol::{codec, Framer, Message, ProtocolError};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::traits::{AsyncStream, BoxedStream, ConnectionId, TransportError};

/// Read buffer growth step.
const READ_CHUNK_SIZE: usize = 4096;

/// One item produced by [`Inbound::recv`].
#[derive(Debug)]
pub enum Received {
    /// A well-formed record.
    Message(Message),
    /// A record that was dropped; the connection is still usable.
    Malformed(ProtocolError),
}

/// An established connection, not yet split.
pub struct Connection {
    outbound: Outbound,
    inbound: Inbound,
    remote_addr: Option<String>,
}

impl Connection {
    /// Wrap a stream, spawning its writer task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(stream: impl AsyncStream, remote_addr: Option<String>, max_frame_size: usize) -> Self {
        let id = ConnectionId::generate();
        let boxed: BoxedStream = Box::new(stream);
        let (reader, writer) = tokio::io::split(boxed);

        let (outbound, rx) = Outbound::detached(id.clone(), max_frame_size);
        tokio::spawn(write_loop(id.clone(), writer, rx));

        Self {
            outbound,
            inbound: Inbound {
                id,
                reader,
                buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
                framer: Framer::new(max_frame_size),
                eof: false,
            },
            remote_addr,
        }
    }

    /// Get the connection's unique identifier.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        self.outbound.id()
    }

    /// Get the remote address of the connection, if available.
    #[must_use]
    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Split into the write handle and the read half.
    #[must_use]
    pub fn into_parts(self) -> (Outbound, Inbound) {
        (self.outbound, self.inbound)
    }
}

/// Cloneable handle for queueing records on a connection.
///
/// Sending never waits for the peer: a record is done once it is handed to
/// the writer task. The writer stops when every handle has been dropped.
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Bytes>,
    framer: Framer,
}

impl Outbound {
    /// Create a handle whose frames land in the returned receiver instead of
    /// a stream.
    #[must_use]
    pub fn detached(id: ConnectionId, max_frame_size: usize) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id,
                tx,
                framer: Framer::new(max_frame_size),
            },
            rx,
        )
    }

    /// Get the connection's unique identifier.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Frame a record without sending it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exceeds the maximum frame size.
    pub fn encode(&self, message: &Message) -> Result<Bytes, TransportError> {
        Ok(self.framer.encode(message)?)
    }

    /// Queue a record for sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be framed or the writer is gone.
    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        trace!(connection = %self.id, kind = ?message.kind(), "Queueing record");
        self.send_raw(self.encode(message)?)
    }

    /// Queue an already framed record.
    ///
    /// This is useful for fan-out, where one frame goes to many connections.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the writer is gone.
    pub fn send_raw(&self, frame: Bytes) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Check if the writer is still accepting records.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Read half of a connection.
pub struct Inbound {
    id: ConnectionId,
    reader: ReadHalf<BoxedStream>,
    buffer: BytesMut,
    framer: Framer,
    eof: bool,
}

impl Inbound {
    /// Get the connection's unique identifier.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Receive the next record.
    ///
    /// Records already buffered are returned before the stream is read
    /// again. Returns `Ok(None)` once the peer has closed the stream.
    /// This method is cancel safe.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the stream fails.
    pub async fn recv(&mut self) -> Result<Option<Received>, TransportError> {
        loop {
            match self.framer.decode_from(&mut self.buffer) {
                Ok(Some(record)) => {
                    return Ok(Some(match codec::decode_bytes(&record) {
                        Ok(message) => Received::Message(message),
                        Err(e) => Received::Malformed(e),
                    }));
                }
                Ok(None) => {}
                Err(e) => return Ok(Some(Received::Malformed(e))),
            }

            if self.eof {
                return Ok(None);
            }

            self.buffer.reserve(READ_CHUNK_SIZE);
            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                self.eof = true;
                debug!(connection = %self.id, "Stream ended");
                if let Err(e) = self.framer.finish(&mut self.buffer) {
                    return Ok(Some(Received::Malformed(e)));
                }
                return Ok(None);
            }
        }
    }
}

async fn write_loop(
    id: ConnectionId,
    mut writer: WriteHalf<BoxedStream>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!(connection = %id, error = %e, "Write failed");
            return;
        }
        // Flush once the queue is drained.
        if rx.is_empty() {
            if let Err(e) = writer.flush().await {
                warn!(connection = %id, error = %e, "Flush failed");
                return;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(connection = %id, error = %e, "Shutdown failed");
    }
    debug!(connection = %id, "Writer finished");
}
