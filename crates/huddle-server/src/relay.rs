//! The relay loop.
//!
//! One task receives a datagram, resolves its room and token, and sends the
//! message to every other bound member before receiving the next. There is no
//! queueing: fan-out time is the loop's throughput.

use crate::handlers::AppState;
use crate::metrics;
use bytes::Bytes;
use huddle_core::RegistryError;
use huddle_protocol::codec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

/// Datagram pump for the relay channel.
pub struct RelayLoop {
    socket: UdpSocket,
    state: Arc<AppState>,
    recv_buffer: Vec<u8>,
}

impl RelayLoop {
    /// Create a relay loop over a bound socket.
    #[must_use]
    pub fn new(socket: UdpSocket, state: Arc<AppState>) -> Self {
        let recv_buffer = vec![0u8; state.config.relay.recv_buffer_size];
        Self {
            socket,
            state,
            recv_buffer,
        }
    }

    /// Receive and relay datagrams forever.
    pub async fn run(mut self) {
        if let Ok(addr) = self.socket.local_addr() {
            info!("Relay loop receiving on {}", addr);
        }

        loop {
            let (len, source) = match self.socket.recv_from(&mut self.recv_buffer).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "Error reading datagram");
                    metrics::record_error("relay_recv");
                    continue;
                }
            };

            let data = Bytes::copy_from_slice(&self.recv_buffer[..len]);
            self.handle_datagram(data, source).await;
        }
    }

    /// Relay one datagram. Returns the number of members it was sent to.
    pub async fn handle_datagram(&self, data: Bytes, source: SocketAddr) -> usize {
        metrics::record_datagram_received();

        let datagram = match codec::decode_datagram(data) {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!(peer = %source, error = %e, "Malformed datagram dropped");
                metrics::record_datagram_dropped("malformed");
                return 0;
            }
        };

        let room = datagram.room_name();
        let token = datagram.token_str();
        trace!(room = %room, peer = %source, bytes = datagram.message.len(), "Datagram received");

        let fan_out = match self.state.registry.relay(&datagram.room, &token, source) {
            Ok(fan_out) => fan_out,
            Err(RegistryError::NotFound(_)) => {
                debug!(room = %room, peer = %source, "Message discarded: room does not exist");
                metrics::record_datagram_dropped("unknown_room");
                return 0;
            }
            Err(e) => {
                debug!(room = %room, peer = %source, error = %e, "Message discarded");
                metrics::record_datagram_dropped("unknown_token");
                return 0;
            }
        };

        let mut delivered = 0;
        for peer in &fan_out.recipients {
            match self.socket.send_to(&datagram.message, peer).await {
                Ok(_) => {
                    delivered += 1;
                    trace!(room = %room, from = %source, to = %peer, "Relayed message");
                }
                Err(e) => {
                    warn!(room = %room, to = %peer, error = %e, "Failed to relay message");
                    metrics::record_error("relay_send");
                }
            }
        }

        metrics::record_relayed(delivered, datagram.message.len());
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use huddle_core::Binding;
    use std::time::Duration;
    use tokio::time::timeout;

    const QUIET: Duration = Duration::from_millis(200);

    struct Peer {
        socket: UdpSocket,
        addr: SocketAddr,
    }

    impl Peer {
        async fn bind() -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let addr = socket.local_addr().unwrap();
            Self { socket, addr }
        }

        async fn recv(&self) -> Option<Vec<u8>> {
            let mut buf = [0u8; 512];
            match timeout(QUIET, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
                _ => None,
            }
        }
    }

    async fn relay_loop() -> RelayLoop {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        RelayLoop::new(socket, Arc::new(AppState::new(Config::default())))
    }

    fn datagram(room: impl AsRef<[u8]>, token: &str, message: &[u8]) -> Bytes {
        codec::encode_datagram(room.as_ref(), token.as_bytes(), message).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_datagram_dropped() {
        let relay = relay_loop().await;
        let peer = Peer::bind().await;

        let sent = relay
            .handle_datagram(Bytes::from_static(&[9, 32, b'x']), peer.addr)
            .await;
        assert_eq!(sent, 0);
        assert_eq!(relay.handle_datagram(Bytes::new(), peer.addr).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_room_and_token_dropped() {
        let relay = relay_loop().await;
        let room = relay.state.registry.create("general", "abc").unwrap();
        let bound = room.admit();
        let listener = Peer::bind().await;
        let sender = Peer::bind().await;

        relay
            .handle_datagram(datagram("general", bound.as_str(), b"bind"), listener.addr)
            .await;

        let forged = "0".repeat(32);
        assert_eq!(
            relay
                .handle_datagram(datagram("general", &forged, b"hi"), sender.addr)
                .await,
            0
        );
        assert_eq!(
            relay
                .handle_datagram(datagram("random", bound.as_str(), b"hi"), sender.addr)
                .await,
            0
        );

        assert!(listener.recv().await.is_none());
        assert_eq!(room.member_count(), 1);
        assert_eq!(room.binding(&forged), None);
    }

    #[tokio::test]
    async fn test_fan_out() {
        let relay = relay_loop().await;
        let room = relay.state.registry.create("general", "abc").unwrap();
        let (t1, t2, t3, t4) = (room.admit(), room.admit(), room.admit(), room.admit());
        let (p1, p2, p3) = (Peer::bind().await, Peer::bind().await, Peer::bind().await);

        // First datagram binds p1 and reaches nobody.
        assert_eq!(
            relay
                .handle_datagram(datagram("general", t1.as_str(), b"one"), p1.addr)
                .await,
            0
        );
        assert_eq!(room.binding(t1.as_str()), Some(Binding::Bound(p1.addr)));

        relay
            .handle_datagram(datagram("general", t2.as_str(), b"two"), p2.addr)
            .await;
        relay
            .handle_datagram(datagram("general", t3.as_str(), b"three"), p3.addr)
            .await;
        assert_eq!(p1.recv().await.as_deref(), Some(&b"two"[..]));
        assert_eq!(p1.recv().await.as_deref(), Some(&b"three"[..]));
        assert_eq!(p2.recv().await.as_deref(), Some(&b"three"[..]));

        // t4 never sent anything and stays unreachable.
        let message = "bob: \u{1F44B} caf\u{e9}".as_bytes();
        let sent = relay
            .handle_datagram(datagram("general", t1.as_str(), message), p1.addr)
            .await;
        assert_eq!(sent, 2);
        assert_eq!(p2.recv().await.as_deref(), Some(message));
        assert_eq!(p3.recv().await.as_deref(), Some(message));
        assert!(p1.recv().await.is_none());
        assert_eq!(room.binding(t4.as_str()), Some(Binding::Unbound));
    }

    #[tokio::test]
    async fn test_bound_address_is_not_refreshed() {
        let relay = relay_loop().await;
        let room = relay.state.registry.create("general", "abc").unwrap();
        let (t1, t2) = (room.admit(), room.admit());
        let (p1, p1_moved, p2) = (Peer::bind().await, Peer::bind().await, Peer::bind().await);

        relay
            .handle_datagram(datagram("general", t1.as_str(), b"hello"), p1.addr)
            .await;
        relay
            .handle_datagram(datagram("general", t1.as_str(), b"moved"), p1_moved.addr)
            .await;
        relay
            .handle_datagram(datagram("general", t2.as_str(), b"ping"), p2.addr)
            .await;

        assert_eq!(p1.recv().await.as_deref(), Some(&b"ping"[..]));
        assert!(p1_moved.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_non_utf8_room_names_are_not_aliased() {
        let relay = relay_loop().await;
        let name = [0xff; 255];
        let room = relay.state.registry.create(name, "abc").unwrap();
        let (t1, t2) = (room.admit(), room.admit());
        let (p1, p2) = (Peer::bind().await, Peer::bind().await);

        relay
            .handle_datagram(datagram(name, t2.as_str(), b"bind"), p2.addr)
            .await;

        // Same replacement text, different bytes: not the same room.
        let alias = [0xfe; 255];
        assert_eq!(
            relay
                .handle_datagram(datagram(alias, t1.as_str(), b"hi"), p1.addr)
                .await,
            0
        );
        assert_eq!(room.binding(t1.as_str()), Some(Binding::Unbound));

        let sent = relay
            .handle_datagram(datagram(name, t1.as_str(), b"hi"), p1.addr)
            .await;
        assert_eq!(sent, 1);
        assert_eq!(p2.recv().await.as_deref(), Some(&b"hi"[..]));
    }
}
