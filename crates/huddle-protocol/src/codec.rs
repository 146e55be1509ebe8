//! Codec for encoding and decoding Huddle frames.
//!
//! All variable-length fields carry a single-byte length prefix, which caps
//! every field at 255 bytes.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::{ControlHeader, ControlRequest, ControlResponse, RelayDatagram};

/// Control header size in bytes.
pub const CONTROL_HEADER_SIZE: usize = 4;

/// Relay datagram header size in bytes.
pub const RELAY_HEADER_SIZE: usize = 2;

/// Largest length a single-byte prefix can describe.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Default datagram receive buffer. Longer datagrams are truncated by the socket.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not enough data for the declared field sizes.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// A field does not fit its single-byte length prefix.
    #[error("Field '{0}' is {1} bytes, maximum is {MAX_FIELD_LEN}")]
    FieldTooLong(&'static str, usize),
}

fn field_len(name: &'static str, field: &[u8]) -> Result<u8, ProtocolError> {
    u8::try_from(field.len()).map_err(|_| ProtocolError::FieldTooLong(name, field.len()))
}

/// Decode a control header.
///
/// # Errors
///
/// Returns an error if fewer than four bytes are given.
pub fn decode_control_header(data: &[u8]) -> Result<ControlHeader, ProtocolError> {
    match data.get(..CONTROL_HEADER_SIZE) {
        Some(&[a, b, c, d]) => Ok(ControlHeader::parse([a, b, c, d])),
        _ => Err(ProtocolError::Incomplete(CONTROL_HEADER_SIZE - data.len())),
    }
}

/// Decode the payload that follows a control header.
///
/// Bytes beyond `header.payload_len()` are ignored.
///
/// # Errors
///
/// Returns an error if the payload is shorter than the header declares.
pub fn decode_control_payload(
    header: &ControlHeader,
    payload: &[u8],
) -> Result<ControlRequest, ProtocolError> {
    let needed = header.payload_len();
    if payload.len() < needed {
        return Err(ProtocolError::Incomplete(needed - payload.len()));
    }

    let room_end = usize::from(header.room_len);
    let password_end = room_end + usize::from(header.password_len);

    Ok(ControlRequest {
        action: header.action,
        room: Bytes::copy_from_slice(&payload[..room_end]),
        password: Bytes::copy_from_slice(&payload[room_end..password_end]),
        username: String::from_utf8_lossy(&payload[password_end..needed]).into_owned(),
    })
}

/// Decode a complete control request (header and payload).
///
/// # Errors
///
/// Returns an error if the data is shorter than the declared sizes.
pub fn decode_control_request(data: &[u8]) -> Result<ControlRequest, ProtocolError> {
    let header = decode_control_header(data)?;
    decode_control_payload(&header, &data[CONTROL_HEADER_SIZE..])
}

/// Encode a control request.
///
/// # Errors
///
/// Returns an error if any field is longer than 255 bytes.
pub fn encode_control_request(request: &ControlRequest) -> Result<Bytes, ProtocolError> {
    let header = ControlHeader {
        room_len: field_len("room", &request.room)?,
        action: request.action,
        password_len: field_len("password", &request.password)?,
        username_len: field_len("username", request.username.as_bytes())?,
    };

    let mut buf = BytesMut::with_capacity(CONTROL_HEADER_SIZE + header.payload_len());
    buf.put_slice(&header.to_bytes());
    buf.put_slice(&request.room);
    buf.put_slice(&request.password);
    buf.put_slice(request.username.as_bytes());

    Ok(buf.freeze())
}

/// Encode a control response as its UTF-8 wire text.
#[must_use]
pub fn encode_response(response: &ControlResponse) -> Bytes {
    Bytes::from(response.to_string())
}

/// Decode a control response. Invalid UTF-8 is replaced.
#[must_use]
pub fn decode_response(data: &[u8]) -> ControlResponse {
    ControlResponse::parse(&String::from_utf8_lossy(data))
}

/// Decode a relay datagram without copying.
///
/// # Errors
///
/// Returns an error if the datagram is shorter than its declared fields.
pub fn decode_datagram(data: Bytes) -> Result<RelayDatagram, ProtocolError> {
    if data.len() < RELAY_HEADER_SIZE {
        return Err(ProtocolError::Incomplete(RELAY_HEADER_SIZE - data.len()));
    }

    let room_end = RELAY_HEADER_SIZE + usize::from(data[0]);
    let token_end = room_end + usize::from(data[1]);
    if data.len() < token_end {
        return Err(ProtocolError::Incomplete(token_end - data.len()));
    }

    Ok(RelayDatagram {
        room: data.slice(RELAY_HEADER_SIZE..room_end),
        token: data.slice(room_end..token_end),
        message: data.slice(token_end..),
    })
}

/// Encode a relay datagram.
///
/// # Errors
///
/// Returns an error if the room name or token is longer than 255 bytes.
pub fn encode_datagram(room: &[u8], token: &[u8], message: &[u8]) -> Result<Bytes, ProtocolError> {
    let room_len = field_len("room", room)?;
    let token_len = field_len("token", token)?;

    let mut buf =
        BytesMut::with_capacity(RELAY_HEADER_SIZE + room.len() + token.len() + message.len());
    buf.put_u8(room_len);
    buf.put_u8(token_len);
    buf.put_slice(room);
    buf.put_slice(token);
    buf.put_slice(message);

    Ok(buf.freeze())
}
