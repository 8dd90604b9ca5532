//! Authenticated API connection.
//!
//! A [`Connection`] only exists once login succeeded. It owns:
//! - the transport and request id counter (inside the dispatcher)
//! - the login result and facade capability table
//! - the CA certificate file used by the TLS session
//!
//! # Example
//!
//! ```no_run
//! use jujulib::Connection;
//! use serde_json::json;
//!
//! # async fn example(ca_cert: String) -> jujulib::Result<()> {
//! let conn = Connection::builder()
//!     .address("10.0.0.1:17070")
//!     .ca_cert(ca_cert)
//!     .auth_tag("user-admin")
//!     .credentials("sekrit")
//!     .environment_uuid("6b5b6c6e-4b9a-4c8e-8d9e-0c2b7a1f3e21")
//!     .connect()
//!     .await?;
//!
//! let client = conn.facade("Client", None)?;
//! let status = client.invoke("FullStatus", json!({})).await?;
//!
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{AuthCredentials, LoginResult};
use crate::rpc::{Dispatcher, LoginNegotiator, RetryPolicy};
use crate::transport::{CaCertFile, Transport};

use super::builder::ConnectionBuilder;
use super::facade::{Facade, FacadeRegistry};

// ============================================================================
// Connection
// ============================================================================

/// An open, authenticated API connection.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Calls made through a shared reference
/// are serialized: one request is on the wire at a time.
pub struct Connection {
    /// Dispatcher owning the transport and request ids.
    rpc: Mutex<Dispatcher<Box<dyn Transport>>>,
    /// Accepted login response.
    login: LoginResult,
    /// Facade capability table.
    facades: FacadeRegistry,
    /// CA certificate file, kept for the lifetime of the TLS session.
    ca_cert: Option<CaCertFile>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("login_version", &self.login.version)
            .field("facades", &self.facades.len())
            .field("ca_cert", &self.ca_cert_path())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Returns a builder for a TLS websocket connection.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Authenticates over an already open transport.
    ///
    /// # Errors
    ///
    /// Returns any login error; see [`LoginNegotiator::authenticate`].
    pub async fn from_transport<T>(
        transport: T,
        credentials: &AuthCredentials,
        retry: RetryPolicy,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        Self::establish(Box::new(transport), credentials, retry, None).await
    }

    /// Logs in and builds the facade table.
    ///
    /// On failure the transport is closed and the certificate file removed.
    pub(crate) async fn establish(
        transport: Box<dyn Transport>,
        credentials: &AuthCredentials,
        retry: RetryPolicy,
        ca_cert: Option<CaCertFile>,
    ) -> Result<Self> {
        let mut rpc = Dispatcher::new(transport, retry);

        let login = match LoginNegotiator::new(credentials).authenticate(&mut rpc).await {
            Ok(login) => login,
            Err(e) => {
                if let Err(close_err) = rpc.close().await {
                    debug!(error = %close_err, "Failed to close transport after login error");
                }
                return Err(e);
            }
        };

        let facades = FacadeRegistry::from_login(&login);
        debug!(
            login_version = login.version,
            facades = facades.len(),
            "Connection authenticated"
        );

        Ok(Self {
            rpc: Mutex::new(rpc),
            login,
            facades,
            ca_cert,
        })
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the login version the server accepted.
    #[inline]
    #[must_use]
    pub fn login_version(&self) -> u32 {
        self.login.version
    }

    /// Returns the raw login response.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &Value {
        &self.login.raw
    }

    /// Returns the facade capability table.
    #[inline]
    #[must_use]
    pub fn facades(&self) -> &FacadeRegistry {
        &self.facades
    }

    /// Returns the CA certificate file path, if this connection wrote one.
    #[inline]
    #[must_use]
    pub fn ca_cert_path(&self) -> Option<&Path> {
        self.ca_cert.as_ref().map(CaCertFile::path)
    }
}

// ============================================================================
// Connection - Calls
// ============================================================================

impl Connection {
    /// Resolves a facade against the capability table.
    ///
    /// Without a version the newest advertised version is used.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownFacade`](crate::Error::UnknownFacade)
    /// - [`Error::FacadeVersionNotSupported`](crate::Error::FacadeVersionNotSupported)
    pub fn facade(&self, name: &str, version: Option<u32>) -> Result<Facade<'_>> {
        let version = self.facades.resolve(name, version)?;
        Ok(Facade::unchecked(self, name, Some(version)))
    }

    /// Calls `facade.method` and returns the response payload.
    ///
    /// Waits for any call already in flight on this connection. After a
    /// transport error every later call fails with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed); open a
    /// new connection instead.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::call`].
    pub async fn call(
        &self,
        facade: &str,
        method: &str,
        params: Value,
        version: Option<u32>,
    ) -> Result<Value> {
        self.rpc
            .lock()
            .await
            .call(facade, method, params, version)
            .await
    }

    /// Closes the websocket and removes the certificate file.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the close handshake fails. The
    /// certificate file is removed either way.
    pub async fn close(self) -> Result<()> {
        let mut rpc = self.rpc.into_inner();
        let result = rpc.close().await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to close connection cleanly");
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
