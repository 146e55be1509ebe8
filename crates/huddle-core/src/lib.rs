//! # huddle-core
//!
//! Session and relay engine for the Huddle group-chat relay.
//!
//! - **Room** - password-gated group with a token -> binding membership map
//! - **RoomRegistry** - process-wide room name -> room map
//! - **Token** - random per-room membership credential
//! - **handshake** - create/join processing for the control channel
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  create/join  ┌──────────────┐      ┌──────────┐
//! │  handshake  │──────────────▶│ RoomRegistry │─────▶│   Room   │
//! └─────────────┘               └──────────────┘      └──────────┘
//!                                      ▲                    │
//!                   relay(room, token) │                    ▼
//!                               ┌──────────────┐      ┌──────────┐
//!                               │  relay loop  │◀─────│  FanOut  │
//!                               └──────────────┘      └──────────┘
//! ```
//!
//! A token starts `Unbound` and becomes `Bound(addr)` on its first relay
//! datagram. Rooms and tokens are never removed.

pub mod handshake;
pub mod registry;
pub mod room;
pub mod token;

pub use registry::{RegistryError, RegistryStats, RoomRegistry};
pub use room::{Binding, FanOut, Room};
pub use token::Token;
