//! WebSocket transport layer.
//!
//! This module owns the encrypted websocket to the API server and exposes
//! it to the dispatcher as whole text messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌──────────────────┐
//! │  Connection      │         TLS WebSocket        │  Juju API        │
//! │  → Dispatcher    │◄────────────────────────────►│  server          │
//! │  → Transport     │   wss://host:17070/...       │                  │
//! └──────────────────┘                              └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cert` | Scoped CA certificate file |
//! | `socket` | TLS websocket implementation of [`Transport`] |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Scoped CA certificate temp file.
pub mod cert;

/// TLS websocket transport.
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cert::CaCertFile;
pub use socket::{TlsSettings, WebSocketTransport};

// ============================================================================
// Transport
// ============================================================================

/// A message-framed duplex channel carrying JSON envelopes.
///
/// Both operations work on whole text messages. Callers send one request
/// and receive exactly one response before sending the next.
#[async_trait]
pub trait Transport: Send {
    /// Sends one text message.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receives the next text message.
    async fn receive(&mut self) -> Result<String>;

    /// Closes the channel. The default does nothing.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, text: String) -> Result<()> {
        (**self).send(text).await
    }

    async fn receive(&mut self) -> Result<String> {
        (**self).receive().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Returns the websocket URL for an API server address.
///
/// With an environment UUID the URL targets that environment's API,
/// otherwise the server root. The address is used verbatim.
#[must_use]
pub fn endpoint_for(address: &str, environment_uuid: &str) -> String {
    if environment_uuid.is_empty() {
        format!("wss://{address}")
    } else {
        format!("wss://{address}/environment/{environment_uuid}/api")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_without_environment() {
        assert_eq!(endpoint_for("host:1234", ""), "wss://host:1234");
    }

    #[test]
    fn test_endpoint_with_environment() {
        assert_eq!(
            endpoint_for("host:1234", "u-1"),
            "wss://host:1234/environment/u-1/api"
        );
    }

    #[test]
    fn test_endpoint_keeps_address_verbatim() {
        assert_eq!(
            endpoint_for("[::1]:17070", "env-uuid"),
            "wss://[::1]:17070/environment/env-uuid/api"
        );
    }
}
