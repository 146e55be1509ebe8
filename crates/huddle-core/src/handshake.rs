//! Control handshake processing.
//!
//! Turns one decoded [`ControlRequest`] into the single response the control
//! connection answers with. Transport-free: the server owns the sockets.

use crate::registry::{RegistryError, RoomRegistry};
use huddle_protocol::{Action, ControlError, ControlRequest, ControlResponse};
use tracing::{debug, info, warn};

/// Process one control request against the registry.
///
/// No lock is held once this returns, so the caller may write the response
/// without blocking other handshakes.
pub fn process(registry: &RoomRegistry, request: &ControlRequest) -> ControlResponse {
    debug!(
        action = request.action,
        room = %request.room_name(),
        user = %request.username,
        "Control request"
    );

    if request.has_empty_field() {
        warn!("Invalid request: room name, password or username is empty");
        return ControlError::InvalidRequest.into();
    }

    match request.action() {
        Ok(Action::Create) => create(registry, request),
        Ok(Action::Join) => join(registry, request),
        Err(code) => {
            warn!(action = code, "Invalid action");
            ControlError::InvalidAction.into()
        }
    }
}

fn create(registry: &RoomRegistry, request: &ControlRequest) -> ControlResponse {
    match registry.create(&request.room, request.password.clone()) {
        Ok(_) => {
            info!(room = %request.room_name(), user = %request.username, "Room created by user");
            ControlResponse::RoomCreated
        }
        Err(RegistryError::AlreadyExists(_)) => {
            warn!(room = %request.room_name(), "Room creation failed: already exists");
            ControlError::RoomAlreadyExists.into()
        }
        Err(e) => {
            warn!(room = %request.room_name(), error = %e, "Room creation failed");
            ControlError::InvalidRequest.into()
        }
    }
}

fn join(registry: &RoomRegistry, request: &ControlRequest) -> ControlResponse {
    let room = match registry.lookup(&request.room) {
        Ok(room) => room,
        Err(_) => {
            warn!(room = %request.room_name(), "Room join failed: room does not exist");
            return ControlError::RoomDoesNotExist.into();
        }
    };

    if !room.check_password(&request.password) {
        warn!(
            room = %request.room_name(),
            user = %request.username,
            "Room join failed: incorrect password"
        );
        return ControlError::IncorrectPassword.into();
    }

    let token = room.admit();
    info!(room = %request.room_name(), user = %request.username, "User joined room");
    ControlResponse::Joined(token.into())
}
