//! Builder pattern for connection configuration.
//!
//! Provides a fluent API for configuring and opening [`Connection`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use jujulib::{Connection, RetryPolicy};
//!
//! # async fn example(ca_cert: String) -> jujulib::Result<()> {
//! let conn = Connection::builder()
//!     .address("10.0.0.1:17070")
//!     .ca_cert(ca_cert)
//!     .auth_tag("machine-0")
//!     .credentials("agent-password")
//!     .nonce("machine-0:nonce")
//!     .retry_policy(RetryPolicy::new(30, Duration::from_secs(2)))
//!     .receive_timeout(Duration::from_secs(120))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::AuthCredentials;
use crate::rpc::RetryPolicy;
use crate::transport::{CaCertFile, TlsSettings, WebSocketTransport, endpoint_for};

use super::Connection;

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct ConnectionBuilder {
    /// API server `host:port`.
    address: Option<String>,
    /// CA certificate in PEM form.
    ca_cert: Option<String>,
    /// Tag of the entity logging in.
    auth_tag: Option<String>,
    /// Password or other credential.
    credentials: String,
    /// Provisioning nonce.
    nonce: Option<String>,
    /// Environment UUID; empty targets the server root.
    environment_uuid: String,
    /// Upgrade retry bounds.
    retry: RetryPolicy,
    /// TLS protocol bounds.
    tls: TlsSettings,
    /// Receive timeout, if any.
    receive_timeout: Option<Duration>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("address", &self.address)
            .field("auth_tag", &self.auth_tag)
            .field("environment_uuid", &self.environment_uuid)
            .field("retry", &self.retry)
            .field("tls", &self.tls)
            .field("receive_timeout", &self.receive_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionBuilder Implementation
// ============================================================================

impl ConnectionBuilder {
    /// Creates a new builder with default retry and TLS settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API server address as `host:port`.
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the CA certificate (PEM) the server certificate must chain to.
    #[inline]
    #[must_use]
    pub fn ca_cert(mut self, pem: impl Into<String>) -> Self {
        self.ca_cert = Some(pem.into());
        self
    }

    /// Sets the tag of the user, machine or unit logging in.
    #[inline]
    #[must_use]
    pub fn auth_tag(mut self, tag: impl Into<String>) -> Self {
        self.auth_tag = Some(tag.into());
        self
    }

    /// Sets the password or other credential.
    #[inline]
    #[must_use]
    pub fn credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = credentials.into();
        self
    }

    /// Sets the provisioning nonce. Only machine agents need one.
    #[inline]
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the environment UUID. Without one the server root is used.
    #[inline]
    #[must_use]
    pub fn environment_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.environment_uuid = uuid.into();
        self
    }

    /// Sets the upgrade retry policy.
    #[inline]
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the TLS protocol bounds.
    #[inline]
    #[must_use]
    pub fn tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// Sets an upper bound for waiting on each response.
    #[inline]
    #[must_use]
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Returns the websocket endpoint this builder targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no address is set.
    pub fn endpoint(&self) -> Result<String> {
        let address = self.validate_address()?;
        Ok(endpoint_for(address, &self.environment_uuid))
    }

    /// Connects, logs in and builds the facade table.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if address, CA certificate or auth tag is not set
    /// - transport errors while opening the websocket
    /// - login errors; see [`LoginNegotiator`](crate::rpc::LoginNegotiator)
    pub async fn connect(self) -> Result<Connection> {
        let endpoint = self.endpoint()?;
        let ca_pem = self.validate_ca_cert()?;
        let credentials = self.credentials_for_login()?;

        let cert = CaCertFile::write(ca_pem)?;
        let transport = WebSocketTransport::connect(&endpoint, cert.path(), &self.tls)
            .await?
            .with_receive_timeout(self.receive_timeout);

        debug!(endpoint = %endpoint, auth_tag = %credentials.auth_tag, "Transport open, logging in");

        Connection::establish(Box::new(transport), &credentials, self.retry, Some(cert)).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionBuilder {
    /// Validates the address configuration.
    fn validate_address(&self) -> Result<&str> {
        match self.address.as_deref() {
            Some(address) if !address.is_empty() => Ok(address),
            _ => Err(Error::config(
                "API server address is required. Use .address() to set it.\n\
                 Example: Connection::builder().address(\"10.0.0.1:17070\")",
            )),
        }
    }

    /// Validates the CA certificate configuration.
    fn validate_ca_cert(&self) -> Result<&str> {
        match self.ca_cert.as_deref() {
            Some(pem) if !pem.trim().is_empty() => Ok(pem),
            _ => Err(Error::config(
                "CA certificate is required. Use .ca_cert() to set the PEM text.",
            )),
        }
    }

    /// Builds login credentials from the configuration.
    fn credentials_for_login(&self) -> Result<AuthCredentials> {
        let auth_tag = match self.auth_tag.as_deref() {
            Some(tag) if !tag.is_empty() => tag,
            _ => {
                return Err(Error::config(
                    "Auth tag is required. Use .auth_tag() to set it.\n\
                     Example: Connection::builder().auth_tag(\"user-admin\")",
                ));
            }
        };

        let mut credentials = AuthCredentials::new(auth_tag, self.credentials.clone());
        credentials.nonce = self.nonce.clone();
        Ok(credentials)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ConnectionBuilder {
        ConnectionBuilder::new()
            .address("localhost:17070")
            .ca_cert("-----BEGIN CERTIFICATE-----\n...")
            .auth_tag("user-admin")
            .credentials("sekrit")
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ConnectionBuilder::new();
        assert!(builder.address.is_none());
        assert!(builder.ca_cert.is_none());
        assert!(builder.nonce.is_none());
        assert_eq!(builder.retry, RetryPolicy::default());
        assert!(matches!(
            builder.tls,
            TlsSettings {
                min_protocol: native_tls::Protocol::Tlsv10,
                max_protocol: Some(native_tls::Protocol::Tlsv10),
            }
        ));
    }

    #[test]
    fn test_endpoint_root() {
        let endpoint = complete().endpoint().expect("endpoint");
        assert_eq!(endpoint, "wss://localhost:17070");
    }

    #[test]
    fn test_endpoint_environment() {
        let endpoint = complete()
            .environment_uuid("env-uuid")
            .endpoint()
            .expect("endpoint");
        assert_eq!(endpoint, "wss://localhost:17070/environment/env-uuid/api");
    }

    #[test]
    fn test_credentials_without_nonce() {
        let creds = complete().credentials_for_login().expect("credentials");
        assert_eq!(creds.auth_tag, "user-admin");
        assert_eq!(creds.credentials, "sekrit");
        assert_eq!(creds.nonce, None);
    }

    #[test]
    fn test_credentials_with_empty_nonce() {
        let creds = complete()
            .nonce("")
            .credentials_for_login()
            .expect("credentials");
        assert_eq!(creds.nonce.as_deref(), Some(""));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", complete());
        assert!(debug.contains("user-admin"));
        assert!(!debug.contains("sekrit"));
    }

    #[tokio::test]
    async fn test_connect_fails_without_address() {
        let err = ConnectionBuilder::new()
            .ca_cert("pem")
            .auth_tag("user-admin")
            .connect()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[tokio::test]
    async fn test_connect_fails_without_ca_cert() {
        let err = ConnectionBuilder::new()
            .address("localhost:17070")
            .auth_tag("user-admin")
            .connect()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("CA certificate"));
    }

    #[tokio::test]
    async fn test_connect_fails_without_auth_tag() {
        let err = ConnectionBuilder::new()
            .address("localhost:17070")
            .ca_cert("pem")
            .connect()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Auth tag"));
    }

    #[tokio::test]
    async fn test_connect_with_invalid_cert_is_tls_error() {
        let err = complete().connect().await.unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }
}
