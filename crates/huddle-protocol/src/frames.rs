//! Frame types for the Huddle protocol.
//!
//! Two channels share one port: a control exchange over TCP (one request,
//! one textual response) and relay datagrams over UDP.

use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Wire text of a successful create.
pub const ROOM_CREATED: &str = "Room created successfully";

/// Prefix carried by every error response.
pub const ERROR_PREFIX: &str = "Error: ";

/// Control actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Create a new room.
    Create = 1,
    /// Join an existing room and receive a membership token.
    Join = 2,
}

impl From<Action> for u8 {
    fn from(action: Action) -> u8 {
        action as u8
    }
}

impl TryFrom<u8> for Action {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Action::Create),
            2 => Ok(Action::Join),
            other => Err(other),
        }
    }
}

/// Fixed 4-byte control header.
///
/// Layout: `[room_len][action][password_len][username_len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    /// Length of the room name in bytes.
    pub room_len: u8,
    /// Raw action code.
    pub action: u8,
    /// Length of the password in bytes.
    pub password_len: u8,
    /// Length of the username in bytes.
    pub username_len: u8,
}

impl ControlHeader {
    /// Parse the header bytes. Every byte pattern is a valid header.
    #[must_use]
    pub fn parse(bytes: [u8; 4]) -> Self {
        Self {
            room_len: bytes[0],
            action: bytes[1],
            password_len: bytes[2],
            username_len: bytes[3],
        }
    }

    /// Header bytes in wire order.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 4] {
        [
            self.room_len,
            self.action,
            self.password_len,
            self.username_len,
        ]
    }

    /// Number of payload bytes that follow the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        usize::from(self.room_len)
            + usize::from(self.password_len)
            + usize::from(self.username_len)
    }
}

/// A decoded control request.
///
/// The action code is kept raw: an unknown code is only reported after the
/// fields have been checked for emptiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    /// Raw action code from the header.
    pub action: u8,
    /// Raw room name bytes. Rooms are identified by these exact bytes.
    pub room: Bytes,
    /// Room password, compared byte for byte.
    pub password: Bytes,
    /// Username. Logged, never used for authorization.
    pub username: String,
}

impl ControlRequest {
    /// Create a new request.
    #[must_use]
    pub fn new(
        action: Action,
        room: impl Into<Bytes>,
        password: impl Into<Bytes>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            room: room.into(),
            password: password.into(),
            username: username.into(),
        }
    }

    /// Create a `Create` request.
    #[must_use]
    pub fn create(room: &str, password: &str, username: &str) -> Self {
        Self::new(
            Action::Create,
            Bytes::copy_from_slice(room.as_bytes()),
            Bytes::copy_from_slice(password.as_bytes()),
            username,
        )
    }

    /// Create a `Join` request.
    #[must_use]
    pub fn join(room: &str, password: &str, username: &str) -> Self {
        Self::new(
            Action::Join,
            Bytes::copy_from_slice(room.as_bytes()),
            Bytes::copy_from_slice(password.as_bytes()),
            username,
        )
    }

    /// Room name as text, for logging.
    #[must_use]
    pub fn room_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.room)
    }

    /// Decoded action, or the raw code if it is unknown.
    pub fn action(&self) -> Result<Action, u8> {
        Action::try_from(self.action)
    }

    /// Whether any of the three fields is empty.
    #[must_use]
    pub fn has_empty_field(&self) -> bool {
        self.room.is_empty() || self.password.is_empty() || self.username.is_empty()
    }
}

/// Reasons a control request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// A required field was empty.
    #[error("Invalid request")]
    InvalidRequest,

    /// Unknown action code.
    #[error("Invalid action")]
    InvalidAction,

    /// Create on a name that is taken.
    #[error("Room already exists")]
    RoomAlreadyExists,

    /// Join on a name that was never created.
    #[error("Room does not exist")]
    RoomDoesNotExist,

    /// Join with the wrong password.
    #[error("Incorrect password")]
    IncorrectPassword,

    /// An error text this library does not recognise.
    #[error("{0}")]
    Other(String),
}

impl ControlError {
    fn from_reason(reason: &str) -> Self {
        match reason {
            "Invalid request" => ControlError::InvalidRequest,
            "Invalid action" => ControlError::InvalidAction,
            "Room already exists" => ControlError::RoomAlreadyExists,
            "Room does not exist" => ControlError::RoomDoesNotExist,
            "Incorrect password" => ControlError::IncorrectPassword,
            other => ControlError::Other(other.to_string()),
        }
    }
}

/// The single response written on a control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// Room was created.
    RoomCreated,
    /// Join accepted; carries the hex token.
    Joined(String),
    /// Request refused.
    Error(ControlError),
}

impl ControlResponse {
    /// Parse a response text as received by a client.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(reason) = text.strip_prefix(ERROR_PREFIX) {
            ControlResponse::Error(ControlError::from_reason(reason))
        } else if text == ROOM_CREATED {
            ControlResponse::RoomCreated
        } else {
            ControlResponse::Joined(text.to_string())
        }
    }

    /// Whether this is an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ControlResponse::Error(_))
    }
}

impl From<ControlError> for ControlResponse {
    fn from(err: ControlError) -> Self {
        ControlResponse::Error(err)
    }
}

impl fmt::Display for ControlResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlResponse::RoomCreated => f.write_str(ROOM_CREATED),
            ControlResponse::Joined(token) => f.write_str(token),
            ControlResponse::Error(err) => write!(f, "{ERROR_PREFIX}{err}"),
        }
    }
}

/// A relay datagram.
///
/// Layout: `[room_len][token_len][room][token][message...]`. The message is
/// everything after the token and is relayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayDatagram {
    /// Raw room name bytes.
    pub room: Bytes,
    /// Raw token bytes.
    pub token: Bytes,
    /// Message payload.
    pub message: Bytes,
}

impl RelayDatagram {
    /// Room name as text, for logging. Lookups use the raw `room` bytes.
    #[must_use]
    pub fn room_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.room)
    }

    /// Token as text.
    #[must_use]
    pub fn token_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_conversion() {
        assert_eq!(Action::try_from(1), Ok(Action::Create));
        assert_eq!(Action::try_from(2), Ok(Action::Join));
        assert_eq!(Action::try_from(0), Err(0));
        assert_eq!(Action::try_from(3), Err(3));
        assert_eq!(u8::from(Action::Join), 2);
    }

    #[test]
    fn test_header_payload_len() {
        let header = ControlHeader::parse([255, 1, 255, 255]);
        assert_eq!(header.payload_len(), 765);
        assert_eq!(header.to_bytes(), [255, 1, 255, 255]);
    }

    #[test]
    fn test_empty_fields() {
        assert!(!ControlRequest::create("general", "abc", "alice").has_empty_field());
        assert!(ControlRequest::create("", "abc", "alice").has_empty_field());
        assert!(ControlRequest::join("general", "", "alice").has_empty_field());
        assert!(ControlRequest::join("general", "abc", "").has_empty_field());
    }

    #[test]
    fn test_response_wire_text() {
        assert_eq!(
            ControlResponse::RoomCreated.to_string(),
            "Room created successfully"
        );
        assert_eq!(
            ControlResponse::from(ControlError::IncorrectPassword).to_string(),
            "Error: Incorrect password"
        );
        assert_eq!(
            ControlResponse::from(ControlError::InvalidAction).to_string(),
            "Error: Invalid action"
        );
        assert_eq!(ControlResponse::Joined("ab12".into()).to_string(), "ab12");
    }

    #[test]
    fn test_response_parse() {
        assert_eq!(
            ControlResponse::parse("Error: Room does not exist"),
            ControlResponse::Error(ControlError::RoomDoesNotExist)
        );
        assert_eq!(
            ControlResponse::parse("Error: Disk on fire"),
            ControlResponse::Error(ControlError::Other("Disk on fire".into()))
        );
        assert_eq!(
            ControlResponse::parse("Room created successfully"),
            ControlResponse::RoomCreated
        );
        assert_eq!(
            ControlResponse::parse("00112233445566778899aabbccddeeff\n"),
            ControlResponse::Joined("00112233445566778899aabbccddeeff".into())
        );
    }
}
