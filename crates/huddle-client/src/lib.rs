//! # huddle-client
//!
//! Async client for the Huddle group-chat relay.
//!
//! - [`ControlClient`] - one-shot create/join exchanges over TCP
//! - [`RelaySocket`] - send and receive room messages over UDP
//!
//! ```rust,ignore
//! use huddle_client::{ControlClient, RelaySocket};
//! use huddle_protocol::ControlResponse;
//!
//! let control = ControlClient::new(server);
//! control.create("general", "abc", "alice").await?;
//! if let ControlResponse::Joined(token) = control.join("general", "abc", "bob").await? {
//!     let relay = RelaySocket::bind(server, "general", token).await?;
//!     relay.send(b"bob: hi").await?;
//!     let reply = relay.recv().await?;
//! }
//! ```

pub mod control;
pub mod error;
pub mod relay;

pub use control::ControlClient;
pub use error::ClientError;
pub use relay::RelaySocket;
