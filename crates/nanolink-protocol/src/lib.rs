//! # nanolink-protocol
//!
//! Wire protocol definitions for the nanolink messaging engine.
//!
//! One persistent connection carries five record kinds, each a single line
//! of text starting with a sigil:
//!
//! - `!` Send: `!<topic>|<payload>`
//! - `?` Request: `?<topic>|<requestId>|<payload>`
//! - `<` Response: `<<requestId>|<statusCode>|<payload>`
//! - `+` Subscribe: `+<topic>|<requestId>`
//! - `-` Unsubscribe: `-<topic>`
//!
//! Records travel inside 4-byte length-prefixed frames (see [`framer`]).
//!
//! ## Example
//!
//! ```rust
//! use nanolink_protocol::{codec, Message, Topic};
//!
//! let message = Message::send(Topic::from(1u32), r#"{"foo":"bar"}"#);
//!
//! let encoded = codec::encode(&message);
//! assert_eq!(encoded, r#"!1|{"foo":"bar"}"#);
//! assert_eq!(codec::decode(&encoded).unwrap(), message);
//! ```

pub mod codec;
pub mod framer;
pub mod message;
pub mod payload;
pub mod topic;

pub use codec::{decode, encode, ProtocolError};
pub use framer::{Framer, MAX_FRAME_SIZE};
pub use message::{Kind, Message, STATUS_OK};
pub use payload::{Json, PayloadCodec, PayloadError};
pub use topic::{IntoTopic, Topic};
