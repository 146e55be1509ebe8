//! # huddle-protocol
//!
//! Wire protocol definitions for the Huddle group-chat relay.
//!
//! Huddle speaks two protocols on the same port:
//!
//! - **Control** (TCP) - one fixed 4-byte header plus three length-prefixed
//!   fields (`room`, `password`, `username`), answered by a single UTF-8 text
//!   response: a success message, a membership token, or `Error: <reason>`.
//! - **Relay** (UDP) - `[room_len][token_len][room][token][message...]`,
//!   where the message is relayed verbatim to the other members of the room.
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, ControlRequest};
//!
//! let request = ControlRequest::join("general", "abc", "bob");
//! let encoded = codec::encode_control_request(&request).unwrap();
//! let decoded = codec::decode_control_request(&encoded).unwrap();
//! assert_eq!(request, decoded);
//!
//! let datagram = codec::encode_datagram(b"general", b"token", b"bob: hi").unwrap();
//! let parsed = codec::decode_datagram(datagram).unwrap();
//! assert_eq!(&parsed.message[..], b"bob: hi");
//! ```

pub mod codec;
pub mod frames;

pub use codec::{ProtocolError, DEFAULT_RECV_BUFFER_SIZE, MAX_FIELD_LEN};
pub use frames::{
    Action, ControlError, ControlHeader, ControlRequest, ControlResponse, RelayDatagram,
};
