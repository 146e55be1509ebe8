//! Room abstraction for Huddle.
//!
//! A room is a named, password-gated group. Its membership map ties each
//! issued token to a [`Binding`], learned from the token's first datagram.

use crate::token::Token;
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Maximum room name length (single-byte length prefix on the wire).
pub const MAX_ROOM_NAME_LENGTH: usize = 255;

/// Validate a raw room name.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &[u8]) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Room name cannot be empty");
    }
    if name.len() > MAX_ROOM_NAME_LENGTH {
        return Err("Room name too long");
    }
    Ok(())
}

/// Where a member can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Token issued, no datagram seen yet.
    Unbound,
    /// Address learned from the token's first datagram. Terminal.
    Bound(SocketAddr),
}

impl Binding {
    /// The bound address, if any.
    #[must_use]
    pub fn addr(&self) -> Option<SocketAddr> {
        match self {
            Binding::Unbound => None,
            Binding::Bound(addr) => Some(*addr),
        }
    }
}

/// Outcome of accepting one datagram from a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut {
    /// Whether this datagram bound the sender.
    pub newly_bound: bool,
    /// Addresses of every other bound member.
    pub recipients: Vec<SocketAddr>,
}

/// A chat room.
#[derive(Debug)]
pub struct Room {
    /// Raw room name, the room's identity.
    name: Bytes,
    /// Shared secret, compared byte for byte.
    password: Bytes,
    /// Token -> binding. Members are never removed.
    members: Mutex<HashMap<Token, Binding>>,
}

impl Room {
    /// Create a new empty room.
    #[must_use]
    pub fn new(name: impl Into<Bytes>, password: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            members: Mutex::new(HashMap::new()),
        }
    }

    /// Get the raw room name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Room name as text, for logging.
    #[must_use]
    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Check a password against the room's.
    #[must_use]
    pub fn check_password(&self, password: &[u8]) -> bool {
        self.password.as_ref() == password
    }

    // No critical section leaves the map half-updated; poisoning is ignored.
    fn members(&self) -> MutexGuard<'_, HashMap<Token, Binding>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of issued tokens.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    /// Number of members with a learned address.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.members()
            .values()
            .filter(|b| matches!(b, Binding::Bound(_)))
            .count()
    }

    /// Get a member's binding.
    #[must_use]
    pub fn binding(&self, token: &str) -> Option<Binding> {
        self.members().get(token).copied()
    }

    /// Issue a fresh token and register it as `Unbound`.
    pub fn admit(&self) -> Token {
        let mut members = self.members();
        loop {
            let token = Token::generate();
            if let Entry::Vacant(slot) = members.entry(token.clone()) {
                slot.insert(Binding::Unbound);
                debug!(room = %self.display_name(), members = members.len(), "Member admitted");
                return token;
            }
        }
    }

    /// Accept a datagram from `token` observed at `source`.
    ///
    /// Binds the token on its first datagram; a bound address is never
    /// re-verified or refreshed. Returns the other bound members, snapshotted
    /// under the same lock as the binding update. Returns `None` for a token
    /// this room never issued.
    pub fn relay_from(&self, token: &str, source: SocketAddr) -> Option<FanOut> {
        let mut members = self.members();

        let binding = members.get_mut(token)?;
        let newly_bound = *binding == Binding::Unbound;
        if newly_bound {
            *binding = Binding::Bound(source);
            debug!(room = %self.display_name(), peer = %source, "Member bound");
        }

        let recipients = members
            .iter()
            .filter(|(other, _)| other.as_str() != token)
            .filter_map(|(_, binding)| binding.addr())
            .collect::<Vec<_>>();

        trace!(room = %self.display_name(), recipients = recipients.len(), "Fan-out planned");

        Some(FanOut {
            newly_bound,
            recipients,
        })
    }
}
