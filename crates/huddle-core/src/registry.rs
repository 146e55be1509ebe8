//! Process-wide room registry.
//!
//! Rooms live until the process exits: there is no delete, expiry or
//! eviction. Rooms are keyed by their raw name bytes, so names that are not
//! valid UTF-8 stay distinct. The map is sharded by room name; `create` and
//! `lookup` stay atomic with respect to each other.

use crate::room::{validate_room_name, FanOut, Room};
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Invalid room name or password.
    #[error("Invalid room: {0}")]
    InvalidRoom(&'static str),

    /// A room with this name already exists.
    #[error("Room already exists: {0}")]
    AlreadyExists(String),

    /// No room with this name.
    #[error("Room not found: {0}")]
    NotFound(String),

    /// The token was not issued by this room.
    #[error("Unknown token for room: {0}")]
    UnknownToken(String),
}

/// The room registry.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Rooms indexed by raw name.
    rooms: DashMap<Bytes, Arc<Room>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken, the name is empty or longer than
    /// 255 bytes, or the password is empty.
    pub fn create(
        &self,
        name: impl AsRef<[u8]>,
        password: impl Into<Bytes>,
    ) -> Result<Arc<Room>, RegistryError> {
        let name = name.as_ref();
        validate_room_name(name).map_err(RegistryError::InvalidRoom)?;
        let password = password.into();
        if password.is_empty() {
            return Err(RegistryError::InvalidRoom("Password cannot be empty"));
        }

        match self.rooms.entry(Bytes::copy_from_slice(name)) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(display(name))),
            Entry::Vacant(slot) => {
                let room = Arc::new(Room::new(slot.key().clone(), password));
                slot.insert(Arc::clone(&room));
                info!(room = %room.display_name(), "Room created");
                Ok(room)
            }
        }
    }

    /// Look up a room by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no such room exists.
    pub fn lookup(&self, name: impl AsRef<[u8]>) -> Result<Arc<Room>, RegistryError> {
        let name = name.as_ref();
        self.rooms
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::NotFound(display(name)))
    }

    /// Accept a relay datagram: resolve the room, bind the token if needed,
    /// and return the addresses to fan out to.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or did not issue the token.
    pub fn relay(
        &self,
        room_name: impl AsRef<[u8]>,
        token: &str,
        source: SocketAddr,
    ) -> Result<FanOut, RegistryError> {
        let room = self.lookup(room_name)?;
        let fan_out = room
            .relay_from(token, source)
            .ok_or_else(|| RegistryError::UnknownToken(room.display_name().into_owned()))?;

        if fan_out.newly_bound {
            debug!(room = %room.display_name(), peer = %source, "Learned member address");
        }
        Ok(fan_out)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, name: impl AsRef<[u8]>) -> bool {
        self.rooms.contains_key(name.as_ref())
    }

    /// Get all raw room names.
    #[must_use]
    pub fn room_names(&self) -> Vec<Bytes> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|e| Arc::clone(e.value())).collect();
        RegistryStats {
            room_count: rooms.len(),
            member_count: rooms.iter().map(|r| r.member_count()).sum(),
            bound_count: rooms.iter().map(|r| r.bound_count()).sum(),
        }
    }
}

fn display(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of rooms.
    pub room_count: usize,
    /// Number of issued tokens across all rooms.
    pub member_count: usize,
    /// Number of members with a learned address.
    pub bound_count: usize,
}
