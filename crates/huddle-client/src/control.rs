//! Control channel client.

use crate::error::ClientError;
use huddle_protocol::{codec, ControlRequest, ControlResponse};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Performs control exchanges against one server.
///
/// Every call opens its own connection: the server answers exactly one
/// request and then closes.
#[derive(Debug, Clone)]
pub struct ControlClient {
    server: SocketAddr,
}

impl ControlClient {
    /// Create a client for the given server address.
    #[must_use]
    pub fn new(server: SocketAddr) -> Self {
        Self { server }
    }

    /// Get the server address.
    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Send one request and read the response.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is too long, the connection fails, or the
    /// server closes without answering.
    pub async fn send(&self, request: &ControlRequest) -> Result<ControlResponse, ClientError> {
        let encoded = codec::encode_control_request(request)?;

        let mut stream = TcpStream::connect(self.server).await?;
        stream.write_all(&encoded).await?;

        let mut response = Vec::with_capacity(64);
        stream.read_to_end(&mut response).await?;
        if response.is_empty() {
            return Err(ClientError::EmptyResponse);
        }

        let response = codec::decode_response(&response);
        debug!(
            server = %self.server,
            room = %request.room_name(),
            response = %response,
            "Control exchange"
        );
        Ok(response)
    }

    /// Create a room.
    ///
    /// # Errors
    ///
    /// See [`ControlClient::send`]. A refusal is an `Ok(ControlResponse::Error)`.
    pub async fn create(
        &self,
        room: &str,
        password: &str,
        username: &str,
    ) -> Result<ControlResponse, ClientError> {
        self.send(&ControlRequest::create(room, password, username))
            .await
    }

    /// Join a room. A successful response carries the membership token.
    ///
    /// # Errors
    ///
    /// See [`ControlClient::send`]. A refusal is an `Ok(ControlResponse::Error)`.
    pub async fn join(
        &self,
        room: &str,
        password: &str,
        username: &str,
    ) -> Result<ControlResponse, ClientError> {
        self.send(&ControlRequest::join(room, password, username))
            .await
    }
}
