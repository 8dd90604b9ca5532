//! Login version negotiation.
//!
//! Servers implement different `Admin.Login` versions. The negotiator
//! starts with the newest version the client knows and steps down each time
//! the server answers `"not implemented"`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{ADMIN_FACADE, AuthCredentials, LOGIN_METHOD, LoginResult};
use crate::transport::Transport;

use super::Dispatcher;

// ============================================================================
// Constants
// ============================================================================

/// Login versions tried, newest first.
pub const LOGIN_VERSIONS: [u32; 3] = [2, 1, 0];

// ============================================================================
// LoginNegotiator
// ============================================================================

/// Authenticates with the newest login version the server accepts.
#[derive(Debug, Clone, Copy)]
pub struct LoginNegotiator<'a> {
    credentials: &'a AuthCredentials,
    versions: &'a [u32],
}

impl<'a> LoginNegotiator<'a> {
    /// Creates a negotiator trying [`LOGIN_VERSIONS`].
    #[inline]
    #[must_use]
    pub fn new(credentials: &'a AuthCredentials) -> Self {
        Self {
            credentials,
            versions: &LOGIN_VERSIONS,
        }
    }

    /// Overrides the versions to try, in order.
    #[inline]
    #[must_use]
    pub fn with_versions(mut self, versions: &'a [u32]) -> Self {
        self.versions = versions;
        self
    }

    /// Logs in, stepping down on `"not implemented"`.
    ///
    /// # Errors
    ///
    /// - [`Error::LoginUnavailable`] if every version was not implemented
    /// - any other error from the first version that failed differently
    /// - [`Error::Protocol`] if the accepted response has no facade list
    pub async fn authenticate<T: Transport>(
        &self,
        dispatcher: &mut Dispatcher<T>,
    ) -> Result<LoginResult> {
        for &version in self.versions {
            let args = self.credentials.login_args(version);

            debug!(version, auth_tag = %self.credentials.auth_tag, "Attempting login");

            match dispatcher
                .call(ADMIN_FACADE, LOGIN_METHOD, Value::Object(args), Some(version))
                .await
            {
                Ok(raw) => {
                    info!(version, auth_tag = %self.credentials.auth_tag, "Login accepted");
                    return LoginResult::parse(version, raw);
                }

                Err(Error::UnimplementedMethod { message }) => {
                    debug!(version, %message, "Login version not implemented");
                }

                Err(e) => return Err(e),
            }
        }

        Err(Error::LoginUnavailable {
            attempted: self.versions.to_vec(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
