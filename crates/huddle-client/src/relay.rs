//! Relay channel client.

use crate::error::ClientError;
use bytes::Bytes;
use huddle_protocol::{codec, DEFAULT_RECV_BUFFER_SIZE};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::trace;

/// A member's datagram socket for one room.
///
/// The server learns this socket's address from the first datagram sent, so
/// nothing is received before [`RelaySocket::send`] has been called once.
#[derive(Debug)]
pub struct RelaySocket {
    socket: UdpSocket,
    server: SocketAddr,
    room: String,
    token: String,
}

impl RelaySocket {
    /// Bind an ephemeral local port for talking to `server`.
    ///
    /// # Errors
    ///
    /// Returns an error if the room name or token is longer than 255 bytes,
    /// or the socket cannot be bound.
    pub async fn bind(
        server: SocketAddr,
        room: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let room = room.into();
        let token = token.into();
        // Field lengths are checked once here.
        codec::encode_datagram(room.as_bytes(), token.as_bytes(), &[])?;

        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;

        Ok(Self {
            socket,
            server,
            room,
            token,
        })
    }

    /// Get the local address of the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.socket.local_addr()?)
    }

    /// Get the room name.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Send a message to the room.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram cannot be sent.
    pub async fn send(&self, message: &[u8]) -> Result<(), ClientError> {
        let datagram =
            codec::encode_datagram(self.room.as_bytes(), self.token.as_bytes(), message)?;
        self.socket.send_to(&datagram, self.server).await?;
        Ok(())
    }

    /// Receive the next relayed message.
    ///
    /// Datagrams from anyone but the server are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if receiving fails.
    pub async fn recv(&self) -> Result<Bytes, ClientError> {
        let mut buf = [0u8; DEFAULT_RECV_BUFFER_SIZE];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            if from == self.server {
                return Ok(Bytes::copy_from_slice(&buf[..len]));
            }
            trace!(from = %from, "Ignoring datagram from unexpected peer");
        }
    }
}
