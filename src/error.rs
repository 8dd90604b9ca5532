//! Error types for the Juju API client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use jujulib::{Connection, Result};
//!
//! async fn example(conn: &Connection) -> Result<()> {
//!     let client = conn.facade("Client", None)?;
//!     let status = client.invoke("FullStatus", serde_json::Value::Null).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::EnvironmentNotBootstrapped`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Tls`], [`Error::WebSocket`], [`Error::Timeout`] |
//! | Server | [`Error::UnimplementedMethod`], [`Error::Server`], [`Error::LoginUnavailable`] |
//! | Facades | [`Error::UnknownFacade`], [`Error::FacadeVersionNotSupported`] |
//! | Protocol | [`Error::InvalidArgument`], [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Yaml`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Constants
// ============================================================================

/// Error code the server uses for unknown methods, facades or versions.
pub const NOT_IMPLEMENTED_CODE: &str = "not implemented";

/// Message fragment the server reports while it is being upgraded.
///
/// Matched as a raw substring of the error message. This is the only place
/// the client depends on the exact server wording.
pub const UPGRADE_IN_PROGRESS: &str = "upgrade in progress";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection parameters are missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No cached connection record exists for the environment.
    #[error("environment {environment} is not bootstrapped")]
    EnvironmentNotBootstrapped {
        /// Name of the environment that was looked up.
        environment: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The websocket session could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The websocket closed while a response was expected.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Reading from the transport exceeded the configured timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Server Errors
    // ========================================================================
    /// The server does not implement the requested method.
    ///
    /// Raised when the error code is `"not implemented"`. The facade name,
    /// the facade version or the method itself may be unknown to the server.
    #[error("Not implemented: {message}")]
    UnimplementedMethod {
        /// Message reported by the server.
        message: String,
    },

    /// Any other error reported by the server.
    #[error("Server error: {message}")]
    Server {
        /// Opaque server error code, if any.
        code: Option<String>,
        /// Message reported by the server.
        message: String,
    },

    /// Every known `Admin.Login` version was rejected as not implemented.
    #[error("Server implements no supported login version (tried {attempted:?})")]
    LoginUnavailable {
        /// Login versions attempted, in order.
        attempted: Vec<u32>,
    },

    // ========================================================================
    // Facade Errors
    // ========================================================================
    /// The server does not advertise the requested facade.
    #[error("Unknown facade: {name}")]
    UnknownFacade {
        /// The requested facade name.
        name: String,
    },

    /// The facade exists but not at the requested version.
    #[error("Facade version not supported: {name} version {version}")]
    FacadeVersionNotSupported {
        /// The requested facade name.
        name: String,
        /// The requested version.
        version: u32,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Invalid argument passed to a call.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Protocol violation or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TLS setup or handshake error.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an environment not bootstrapped error.
    #[inline]
    pub fn environment_not_bootstrapped(environment: impl Into<String>) -> Self {
        Self::EnvironmentNotBootstrapped {
            environment: environment.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Builds the error for a server error envelope.
    ///
    /// `"not implemented"` maps to [`Error::UnimplementedMethod`]; every
    /// other code maps to [`Error::Server`].
    pub fn from_server(code: Option<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some(code) if code == NOT_IMPLEMENTED_CODE => Self::UnimplementedMethod { message },
            code => Self::Server { code, message },
        }
    }

    /// Creates an unknown facade error.
    #[inline]
    pub fn unknown_facade(name: impl Into<String>) -> Self {
        Self::UnknownFacade { name: name.into() }
    }

    /// Creates a facade version not supported error.
    #[inline]
    pub fn facade_version_not_supported(name: impl Into<String>, version: u32) -> Self {
        Self::FacadeVersionNotSupported {
            name: name.into(),
            version,
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error is fatal to the transport.
    ///
    /// A connection that produced a transport error should be discarded.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::Timeout { .. }
                | Self::Tls(_)
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the server reported `"not implemented"`.
    #[inline]
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::UnimplementedMethod { .. })
    }

    /// Returns `true` if the server was still upgrading when retries ran out.
    #[inline]
    #[must_use]
    pub fn is_upgrade_in_progress(&self) -> bool {
        match self {
            Self::Server { message, .. } => is_upgrade_message(message),
            _ => false,
        }
    }

    /// Returns the server error code, if this error came from the server.
    #[must_use]
    pub fn server_code(&self) -> Option<&str> {
        match self {
            Self::UnimplementedMethod { .. } => Some(NOT_IMPLEMENTED_CODE),
            Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Returns `true` if a server error message signals an upgrade in progress.
#[inline]
#[must_use]
pub(crate) fn is_upgrade_message(message: &str) -> bool {
    message.contains(UPGRADE_IN_PROGRESS)
}

// ============================================================================
// Tests
// ============================================================================
