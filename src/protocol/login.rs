//! Login credential shapes and the login result.
//!
//! The `Admin.Login` parameters changed key names between versions:
//!
//! | Version | Keys |
//! |---------|------|
//! | 0 | `AuthTag`, `Password`, `Nonce` |
//! | 1, 2 | `auth-tag`, `credentials`, `nonce` |
//!
//! The nonce key is present only when a nonce was supplied, so an empty
//! nonce and no nonce stay distinguishable on the wire.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

use super::Params;

// ============================================================================
// Constants
// ============================================================================

/// Facade carrying the login method.
pub const ADMIN_FACADE: &str = "Admin";

/// Login method name.
pub const LOGIN_METHOD: &str = "Login";

// ============================================================================
// AuthCredentials
// ============================================================================

/// Credentials presented at login.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredentials {
    /// Tag of the entity logging in, e.g. `user-admin` or `machine-0`.
    pub auth_tag: String,
    /// Password, or another credential understood by the server.
    pub credentials: String,
    /// Provisioning nonce. Only machine agents send one.
    pub nonce: Option<String>,
}

impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("auth_tag", &self.auth_tag)
            .field("credentials", &"<redacted>")
            .field("nonce", &self.nonce)
            .finish()
    }
}

impl AuthCredentials {
    /// Creates credentials without a nonce.
    #[inline]
    #[must_use]
    pub fn new(auth_tag: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            auth_tag: auth_tag.into(),
            credentials: credentials.into(),
            nonce: None,
        }
    }

    /// Sets the nonce. An empty string is still sent.
    #[inline]
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Builds the `Admin.Login` params for the given login version.
    #[must_use]
    pub fn login_args(&self, version: u32) -> Params {
        let (tag_key, credentials_key, nonce_key) = if version == 0 {
            ("AuthTag", "Password", "Nonce")
        } else {
            ("auth-tag", "credentials", "nonce")
        };

        let mut args = Params::new();
        args.insert(tag_key.into(), Value::String(self.auth_tag.clone()));
        args.insert(
            credentials_key.into(),
            Value::String(self.credentials.clone()),
        );
        if let Some(nonce) = &self.nonce {
            args.insert(nonce_key.into(), Value::String(nonce.clone()));
        }
        args
    }
}

// ============================================================================
// FacadeVersions
// ============================================================================

/// One entry of the server's capability list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FacadeVersions {
    /// Facade name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Versions of the facade the server supports.
    #[serde(rename = "Versions")]
    pub versions: Vec<u32>,
}

// ============================================================================
// LoginResult
// ============================================================================

/// A successful login response.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResult {
    /// Login protocol version the server accepted.
    pub version: u32,
    /// Facades advertised by the server.
    pub facades: Vec<FacadeVersions>,
    /// The raw response payload.
    pub raw: Value,
}

#[derive(Deserialize)]
struct LoginFacades {
    #[serde(alias = "Facades")]
    facades: Vec<FacadeVersions>,
}

impl LoginResult {
    /// Parses the login response payload accepted at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the payload has no valid facade list.
    pub fn parse(version: u32, raw: Value) -> Result<Self> {
        let LoginFacades { facades } = LoginFacades::deserialize(&raw).map_err(|e| {
            Error::protocol(format!("login response has no valid facade list: {e}"))
        })?;

        Ok(Self {
            version,
            facades,
            raw,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
