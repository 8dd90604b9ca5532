//! jujulib - Juju API client.
//!
//! This library talks to a Juju API server over its JSON RPC protocol,
//! carried on a TLS websocket.
//!
//! # Architecture
//!
//! ```text
//! ConfigStore ──► ConnectionBuilder ──► WebSocketTransport (TLS)
//!                        │
//!                        ▼
//!                 LoginNegotiator (Admin.Login v2 → v1 → v0)
//!                        │
//!                        ▼
//!   Connection ── FacadeRegistry ──► Facade::invoke ──► Dispatcher
//! ```
//!
//! Key design principles:
//!
//! - One request on the wire at a time; responses arrive in request order
//! - Request ids are scoped to the connection and never reused
//! - A [`Connection`] only exists once login succeeded
//! - Facade versions are checked against what the server advertised
//!
//! # Quick Start
//!
//! ```no_run
//! use jujulib::{Result, open_environment};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Look up cached credentials and log in
//!     let conn = open_environment("local").await?;
//!
//!     // Newest Client facade the server supports
//!     let client = conn.facade("Client", None)?;
//!     let status = client.invoke("FullStatus", json!({})).await?;
//!     println!("{status:#}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Connection`], [`ConnectionBuilder`], [`Facade`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelopes and login shapes |
//! | [`rpc`] | Dispatcher, upgrade retry and login negotiation |
//! | [`store`] | Cached environment connection details |
//! | [`transport`] | TLS websocket transport |

// ============================================================================
// Modules
// ============================================================================

/// Authenticated connections and facades.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire envelope types.
pub mod protocol;

/// Request dispatch and login negotiation.
pub mod rpc;

/// Local store of environment connection details.
pub mod store;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Connection, ConnectionBuilder, Facade, FacadeRegistry};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::RequestId;

// Protocol types
pub use protocol::{AuthCredentials, Request, Response};

// RPC types
pub use rpc::{Dispatcher, LoginNegotiator, RetryPolicy};

// Store types
pub use store::{ConfigStore, ConnectionInfo, Environment, open_environment};

// Transport types
pub use transport::{Transport, TlsSettings, WebSocketTransport, endpoint_for};
