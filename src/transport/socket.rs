//! TLS websocket transport.
//!
//! Opens the websocket to the API server and moves whole text frames.
//!
//! # TLS
//!
//! API servers of this generation only speak TLS 1.0 and present
//! certificates whose names do not match the dialled address. The
//! connector therefore:
//!
//! - pins the protocol to TLS 1.0 (see [`TlsSettings`])
//! - trusts only the supplied CA certificate
//! - skips hostname verification

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use native_tls::{Certificate, Protocol, TlsConnector};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as HandshakeRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info, trace};
use url::Url;

use crate::error::{Error, Result};

use super::Transport;

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream over plain or TLS TCP.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// TlsSettings
// ============================================================================

/// TLS protocol bounds for the API connection.
#[derive(Debug, Clone, Copy)]
pub struct TlsSettings {
    /// Lowest protocol version offered.
    pub min_protocol: Protocol,
    /// Highest protocol version offered. `None` leaves it to the TLS library.
    pub max_protocol: Option<Protocol>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self::legacy()
    }
}

impl TlsSettings {
    /// TLS 1.0 only, as required by the target servers.
    #[inline]
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            min_protocol: Protocol::Tlsv10,
            max_protocol: Some(Protocol::Tlsv10),
        }
    }

    /// TLS 1.2 or newer, for servers that support it.
    #[inline]
    #[must_use]
    pub const fn modern() -> Self {
        Self {
            min_protocol: Protocol::Tlsv12,
            max_protocol: None,
        }
    }

    /// Builds a connector trusting only `ca_pem`, without hostname checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the certificate cannot be parsed or the
    /// connector cannot be built.
    pub fn connector(&self, ca_pem: &[u8]) -> Result<TlsConnector> {
        let ca = Certificate::from_pem(ca_pem)?;

        let connector = TlsConnector::builder()
            .min_protocol_version(Some(self.min_protocol))
            .max_protocol_version(self.max_protocol)
            .disable_built_in_roots(true)
            .add_root_certificate(ca)
            .danger_accept_invalid_hostnames(true)
            .build()?;

        Ok(connector)
    }
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Websocket carrying the RPC envelopes.
///
/// Ping, pong and binary frames are skipped while waiting for a response.
pub struct WebSocketTransport {
    /// Underlying websocket stream.
    stream: WsStream,
    /// Upper bound for one receive, if any.
    receive_timeout: Option<Duration>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("receive_timeout", &self.receive_timeout)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Wraps an established websocket stream.
    #[inline]
    #[must_use]
    pub fn new(stream: WsStream) -> Self {
        Self {
            stream,
            receive_timeout: None,
        }
    }

    /// Sets the receive timeout. `None` waits indefinitely.
    #[inline]
    #[must_use]
    pub fn with_receive_timeout(mut self, receive_timeout: Option<Duration>) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }

    /// Opens a TLS websocket to `endpoint`.
    ///
    /// The server certificate must chain to the CA stored at `ca_cert_path`.
    /// The `Origin` header is set to the endpoint itself.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is not a websocket URL
    /// - [`Error::Connection`] if the CA file cannot be read, or the socket,
    ///   TLS or websocket handshake fails
    /// - [`Error::Tls`] if the CA certificate is invalid
    pub async fn connect(endpoint: &str, ca_cert_path: &Path, tls: &TlsSettings) -> Result<Self> {
        let request = client_request(endpoint)?;

        let ca_pem = tokio::fs::read(ca_cert_path).await.map_err(|e| {
            Error::connection(format!(
                "Failed to read CA certificate {}: {e}",
                ca_cert_path.display()
            ))
        })?;
        let connector = tls.connector(&ca_pem)?;

        debug!(endpoint, ?tls, "Opening WebSocket");

        let (stream, response) = connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::NativeTls(connector)),
        )
        .await
        .map_err(|e| Error::connection(format!("WebSocket connect to {endpoint} failed: {e}")))?;

        info!(endpoint, status = %response.status(), "WebSocket connection established");

        Ok(Self::new(stream))
    }

    /// Reads frames until the next text message.
    async fn next_text(&mut self) -> Result<String> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),

                Message::Close(frame) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return Err(Error::ConnectionClosed);
                }

                // Ignore Binary, Ping, Pong
                other => trace!(len = other.len(), "Skipping non-text frame"),
            }
        }

        debug!("WebSocket stream ended");
        Err(Error::ConnectionClosed)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        match self.receive_timeout {
            Some(limit) => timeout(limit, self.next_text())
                .await
                .map_err(|_| Error::timeout("receive response", millis(limit)))?,
            None => self.next_text().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        debug!("WebSocket closed");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds in `limit`, saturating at `u64::MAX`.
fn millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

/// Builds the handshake request with `Origin` equal to the endpoint.
fn client_request(endpoint: &str) -> Result<HandshakeRequest> {
    let url = Url::parse(endpoint)
        .map_err(|e| Error::config(format!("Invalid endpoint {endpoint}: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") || url.host_str().is_none() {
        return Err(Error::config(format!(
            "Endpoint must be a ws:// or wss:// URL with a host: {endpoint}"
        )));
    }

    let mut request = endpoint.into_client_request()?;
    let origin = HeaderValue::from_str(endpoint)
        .map_err(|e| Error::config(format!("Invalid origin {endpoint}: {e}")))?;
    request.headers_mut().insert(ORIGIN, origin);

    Ok(request)
}

// ============================================================================
// Tests
// ============================================================================
