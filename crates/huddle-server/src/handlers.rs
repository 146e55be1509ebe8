//! Connection handlers for Huddle server.
//!
//! Control connections are served one task each; the relay loop runs on the
//! calling task until the process exits.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::relay::RelayLoop;
use anyhow::{Context, Result};
use huddle_core::{handshake, RoomRegistry};
use huddle_protocol::codec::{self, CONTROL_HEADER_SIZE};
use huddle_protocol::{Action, ControlError, ControlHeader, ControlRequest, ControlResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// All rooms.
    pub registry: RoomRegistry,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            registry: RoomRegistry::new(),
            config,
        }
    }
}

/// Bind the control and relay sockets and serve forever.
///
/// # Errors
///
/// Returns an error if either socket cannot be bound.
pub async fn run_server(config: Config) -> Result<()> {
    let addr = config.bind_addr()?;

    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to start TCP listener on {addr}"))?;
    let socket = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("Failed to start UDP listener on {addr}"))?;

    info!("Huddle server listening on {} (control tcp, relay udp)", addr);

    let state = Arc::new(AppState::new(config));
    serve(listener, socket, state).await;

    Ok(())
}

/// Serve control connections in the background and run the relay loop.
pub async fn serve(listener: TcpListener, socket: UdpSocket, state: Arc<AppState>) {
    tokio::spawn(accept_loop(listener, Arc::clone(&state)));
    RelayLoop::new(socket, state).run().await;
}

async fn accept_loop(listener: TcpListener, state: Arc<AppState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_control(stream, peer, &state).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "Error accepting control connection");
                metrics::record_error("accept");
            }
        }
    }
}

/// Handle one control connection: read a request, answer once, close.
pub async fn handle_control<S>(mut stream: S, peer: SocketAddr, state: &AppState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _metrics_guard = ConnectionMetricsGuard::new();

    let request = match read_request(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            debug!(
                peer = %peer,
                error = %e,
                "Control connection closed before a full request"
            );
            metrics::record_error("control_read");
            return;
        }
    };

    let response = handshake::process(&state.registry, &request);
    record_outcome(&request, &response);

    let payload = codec::encode_response(&response);
    if let Err(e) = stream.write_all(&payload).await {
        warn!(peer = %peer, error = %e, "Failed to write control response");
        metrics::record_error("control_write");
        return;
    }
    if let Err(e) = stream.shutdown().await {
        debug!(peer = %peer, error = %e, "Control shutdown failed");
    }

    metrics::set_registry_gauges(state.registry.stats());
}

async fn read_request<S>(stream: &mut S) -> Result<ControlRequest>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; CONTROL_HEADER_SIZE];
    stream
        .read_exact(&mut header)
        .await
        .context("reading control header")?;
    let header = ControlHeader::parse(header);

    let mut payload = vec![0u8; header.payload_len()];
    stream
        .read_exact(&mut payload)
        .await
        .context("reading control payload")?;

    Ok(codec::decode_control_payload(&header, &payload)?)
}

fn record_outcome(request: &ControlRequest, response: &ControlResponse) {
    let action = match request.action() {
        Ok(Action::Create) => "create",
        Ok(Action::Join) => "join",
        Err(_) => "unknown",
    };
    let outcome = match response {
        ControlResponse::RoomCreated | ControlResponse::Joined(_) => "ok",
        ControlResponse::Error(ControlError::InvalidRequest) => "invalid_request",
        ControlResponse::Error(ControlError::InvalidAction) => "invalid_action",
        ControlResponse::Error(ControlError::RoomAlreadyExists) => "room_exists",
        ControlResponse::Error(ControlError::RoomDoesNotExist) => "room_missing",
        ControlResponse::Error(ControlError::IncorrectPassword) => "bad_password",
        ControlResponse::Error(ControlError::Other(_)) => "error",
    };
    metrics::record_control_request(action, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_client::{ControlClient, RelaySocket};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(200);

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()))
    }

    async fn exchange(state: &AppState, request: &[u8]) -> String {
        let (mut client, server) = tokio::io::duplex(1024);
        let peer: SocketAddr = "127.0.0.1:5555".parse().unwrap();

        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();
        handle_control(server, peer, state).await;

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_handle_control_create_and_join() {
        let state = test_state();

        let create =
            codec::encode_control_request(&ControlRequest::create("general", "abc", "alice"))
                .unwrap();
        assert_eq!(exchange(&state, &create).await, "Room created successfully");
        assert_eq!(exchange(&state, &create).await, "Error: Room already exists");

        let join =
            codec::encode_control_request(&ControlRequest::join("general", "abc", "bob")).unwrap();
        let token = exchange(&state, &join).await;
        assert_eq!(token.len(), 32);
        assert_eq!(state.registry.lookup("general").unwrap().member_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_control_rejects_bad_requests() {
        let state = test_state();

        // Empty username.
        let empty_user = [&[7u8, 1, 3, 0][..], &b"generalabc"[..]].concat();
        assert_eq!(exchange(&state, &empty_user).await, "Error: Invalid request");
        // Unknown action.
        assert_eq!(
            exchange(&state, &[1, 5, 1, 1, b'r', b'p', b'u']).await,
            "Error: Invalid action"
        );
        assert!(state.registry.room_names().is_empty());
    }

    #[tokio::test]
    async fn test_handle_control_truncated_request_gets_no_response() {
        let state = test_state();
        // Header declares 15 payload bytes, only 3 arrive before EOF.
        assert_eq!(exchange(&state, &[7, 1, 3, 5, b'g', b'e', b'n']).await, "");
        assert!(state.registry.room_names().is_empty());
    }

    async fn start_server() -> (SocketAddr, SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let control_addr = listener.local_addr().unwrap();
        let relay_addr = socket.local_addr().unwrap();

        let handle = tokio::spawn(serve(listener, socket, test_state()));
        (control_addr, relay_addr, handle)
    }

    fn token_of(response: ControlResponse) -> String {
        match response {
            ControlResponse::Joined(token) => token,
            other => panic!("Expected a token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_chat() {
        let (control_addr, relay_addr, server) = start_server().await;
        let control = ControlClient::new(control_addr);

        assert_eq!(
            control.create("general", "abc", "alice").await.unwrap(),
            ControlResponse::RoomCreated
        );
        assert_eq!(
            control.join("general", "wrong", "bob").await.unwrap(),
            ControlResponse::Error(ControlError::IncorrectPassword)
        );
        assert_eq!(
            control.join("random", "abc", "bob").await.unwrap(),
            ControlResponse::Error(ControlError::RoomDoesNotExist)
        );

        let t1 = token_of(control.join("general", "abc", "bob").await.unwrap());
        let t2 = token_of(control.join("general", "abc", "carol").await.unwrap());
        assert_eq!(t1.len(), 32);
        assert_ne!(t1, t2);

        let bob = RelaySocket::bind(relay_addr, "general", t1.as_str()).await.unwrap();
        let carol = RelaySocket::bind(relay_addr, "general", t2.as_str()).await.unwrap();

        // Nobody else is bound yet: bob's first message goes nowhere.
        bob.send(b"bob: hi").await.unwrap();
        assert!(timeout(QUIET, bob.recv()).await.is_err());

        // Carol binds; bob is already bound and hears her.
        carol.send(b"carol: hello").await.unwrap();
        let heard = timeout(WAIT, bob.recv()).await.unwrap().unwrap();
        assert_eq!(&heard[..], b"carol: hello");

        // Now bob reaches carol verbatim, without an echo back to bob.
        bob.send(b"bob: hi again").await.unwrap();
        let heard = timeout(WAIT, carol.recv()).await.unwrap().unwrap();
        assert_eq!(&heard[..], b"bob: hi again");
        assert!(timeout(QUIET, bob.recv()).await.is_err());

        server.abort();
    }

    #[tokio::test]
    async fn test_forged_token_is_not_relayed() {
        let (control_addr, relay_addr, server) = start_server().await;
        let control = ControlClient::new(control_addr);

        control.create("general", "abc", "alice").await.unwrap();
        let token = token_of(control.join("general", "abc", "bob").await.unwrap());

        let bob = RelaySocket::bind(relay_addr, "general", token.as_str()).await.unwrap();
        bob.send(b"bob: binding").await.unwrap();

        let forger = RelaySocket::bind(relay_addr, "general", "f".repeat(32)).await.unwrap();
        forger.send(b"mallory: let me in").await.unwrap();
        let lost = RelaySocket::bind(relay_addr, "nowhere", token.as_str()).await.unwrap();
        lost.send(b"bob: wrong room").await.unwrap();

        assert!(timeout(QUIET, bob.recv()).await.is_err());

        server.abort();
    }
}
