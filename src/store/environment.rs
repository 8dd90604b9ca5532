//! Named environments.
//!
//! An environment counts as running when the local store holds connection
//! details for it.

// ============================================================================
// Imports
// ============================================================================

use tracing::info;

use crate::client::Connection;
use crate::error::{Error, Result};

use super::{ConfigStore, ConnectionInfo};

// ============================================================================
// Environment
// ============================================================================

/// An environment known by name to the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
    store: ConfigStore,
}

impl Environment {
    /// Creates a handle using the default store directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the store directory cannot be determined.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self::with_store(name, ConfigStore::new()?))
    }

    /// Creates a handle backed by a specific store.
    #[inline]
    #[must_use]
    pub fn with_store(name: impl Into<String>, store: ConfigStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    /// Returns the environment name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up the cached connection details.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::connection_info`].
    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        self.store.connection_info(&self.name)
    }

    /// Returns `true` if connection details are cached for the environment.
    ///
    /// # Errors
    ///
    /// Propagates store errors other than
    /// [`Error::EnvironmentNotBootstrapped`].
    pub fn is_running(&self) -> Result<bool> {
        match self.connection_info() {
            Ok(_) => Ok(true),
            Err(Error::EnvironmentNotBootstrapped { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Opens an authenticated connection to the environment's API.
    ///
    /// Connects to the first cached API address as `user-<user>`.
    ///
    /// # Errors
    ///
    /// - store errors from [`Environment::connection_info`]
    /// - [`Error::Config`] if no API address is cached
    /// - connection and login errors
    pub async fn open(&self) -> Result<Connection> {
        let info = self.connection_info()?;
        let address = info.state_servers.first().ok_or_else(|| {
            Error::config(format!(
                "Environment {} has no cached API addresses",
                self.name
            ))
        })?;

        info!(environment = %self.name, %address, "Opening environment connection");

        Connection::builder()
            .address(address.as_str())
            .ca_cert(info.ca_cert.as_str())
            .auth_tag(info.auth_tag())
            .credentials(info.password.as_str())
            .environment_uuid(info.environ_uuid.as_str())
            .connect()
            .await
    }
}

/// Opens an authenticated connection to a named environment.
///
/// The environment is looked up in the default store.
///
/// # Errors
///
/// See [`Environment::open`].
pub async fn open_environment(name: &str) -> Result<Connection> {
    Environment::new(name)?.open().await
}

// ============================================================================
// Tests
// ============================================================================
