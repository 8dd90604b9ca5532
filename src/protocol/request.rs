//! Request and Response envelope types.
//!
//! Every RPC is one request envelope followed by one response envelope on
//! the same websocket. Responses are correlated by arrival order.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result, is_upgrade_message};
use crate::identifiers::RequestId;

// ============================================================================
// Types
// ============================================================================

/// Parameters object of a request envelope.
pub type Params = Map<String, Value>;

// ============================================================================
// Request
// ============================================================================

/// A request envelope from client to server.
///
/// # Format
///
/// ```json
/// {
///   "Type": "Client",
///   "Request": "FullStatus",
///   "Params": { ... },
///   "RequestId": 3,
///   "Version": 1
/// }
/// ```
///
/// `Version` is omitted when no version was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Facade name.
    #[serde(rename = "Type")]
    pub facade: String,

    /// Method name within the facade.
    #[serde(rename = "Request")]
    pub method: String,

    /// Method parameters.
    #[serde(rename = "Params")]
    pub params: Params,

    /// Connection-scoped request id.
    #[serde(rename = "RequestId")]
    pub id: RequestId,

    /// Facade version, if any.
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl Request {
    /// Creates a new request envelope.
    #[inline]
    #[must_use]
    pub fn new(
        id: RequestId,
        facade: impl Into<String>,
        method: impl Into<String>,
        params: Params,
        version: Option<u32>,
    ) -> Self {
        Self {
            facade: facade.into(),
            method: method.into(),
            params,
            id,
            version,
        }
    }
}

/// Converts caller-supplied params into an envelope params object.
///
/// `null` becomes an empty object.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for any JSON value other than an
/// object or `null`.
pub fn params_from_value(value: Value) -> Result<Params> {
    match value {
        Value::Null => Ok(Params::new()),
        Value::Object(map) => Ok(map),
        other => Err(Error::invalid_argument(format!(
            "params must be a JSON object, got {other}"
        ))),
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response envelope from server to client.
///
/// # Format
///
/// Success:
/// ```json
/// { "RequestId": 3, "Response": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "RequestId": 3, "ErrorCode": "not implemented", "Error": "unknown object type" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Echoed request id. Not used for correlation.
    #[serde(rename = "RequestId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Result payload (if success).
    #[serde(rename = "Response", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    /// Error code (if error). May be `null` on the wire.
    #[serde(rename = "ErrorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Error message (if error).
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(response: Value) -> Self {
        Self {
            response: Some(response),
            ..Self::default()
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            error_code: code.map(str::to_string),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if the server reported an upgrade in progress.
    #[inline]
    #[must_use]
    pub fn is_upgrade_in_progress(&self) -> bool {
        self.error.as_deref().is_some_and(is_upgrade_message)
    }

    /// Extracts the result payload, or the typed server error.
    ///
    /// # Errors
    ///
    /// - [`Error::UnimplementedMethod`] if the error code is `"not implemented"`
    /// - [`Error::Server`] for any other error response
    /// - [`Error::Protocol`] if the envelope holds neither shape
    pub fn into_result(self) -> Result<Value> {
        if let Some(message) = self.error {
            return Err(Error::from_server(self.error_code, message));
        }

        self.response.ok_or_else(|| {
            Error::protocol("response envelope carries neither Response nor Error")
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
