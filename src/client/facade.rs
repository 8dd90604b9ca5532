//! Facade capability table and facade proxies.
//!
//! The login response lists every facade the server exposes together with
//! its supported versions. [`FacadeRegistry`] keeps that list and resolves
//! facade requests against it; [`Facade`] is the callable handle it hands
//! out.
//!
//! # Example
//!
//! ```ignore
//! let client = conn.facade("Client", None)?;
//! let status = client.invoke("FullStatus", json!({})).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{FacadeVersions, LoginResult};

use super::Connection;

// ============================================================================
// FacadeRegistry
// ============================================================================

/// Facade name to supported versions, as advertised at login.
///
/// Built once per connection and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacadeRegistry {
    facades: FxHashMap<String, BTreeSet<u32>>,
}

impl FacadeRegistry {
    /// Builds the registry from a login result.
    #[must_use]
    pub fn from_login(login: &LoginResult) -> Self {
        Self::from_entries(login.facades.iter().cloned())
    }

    /// Builds the registry from capability entries.
    ///
    /// Repeated names merge their versions.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = FacadeVersions>) -> Self {
        let mut facades: FxHashMap<String, BTreeSet<u32>> = FxHashMap::default();
        for entry in entries {
            facades.entry(entry.name).or_default().extend(entry.versions);
        }
        Self { facades }
    }

    /// Resolves a facade request to a concrete version.
    ///
    /// Without a version, the newest advertised version is chosen.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownFacade`] if the server does not advertise `name`,
    ///   or advertises it with no versions
    /// - [`Error::FacadeVersionNotSupported`] if `version` is not advertised
    pub fn resolve(&self, name: &str, version: Option<u32>) -> Result<u32> {
        let versions = self
            .facades
            .get(name)
            .ok_or_else(|| Error::unknown_facade(name))?;

        match version {
            None => versions
                .last()
                .copied()
                .ok_or_else(|| Error::unknown_facade(name)),
            Some(v) if versions.contains(&v) => Ok(v),
            Some(v) => Err(Error::facade_version_not_supported(name, v)),
        }
    }

    /// Returns the advertised versions of a facade.
    #[inline]
    #[must_use]
    pub fn versions(&self, name: &str) -> Option<&BTreeSet<u32>> {
        self.facades.get(name)
    }

    /// Returns `true` if the facade is advertised.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.facades.contains_key(name)
    }

    /// Returns the advertised facade names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.facades.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of advertised facades.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.facades.len()
    }

    /// Returns `true` if no facade is advertised.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facades.is_empty()
    }
}

// ============================================================================
// Facade
// ============================================================================

/// A facade bound to a connection at one version.
///
/// Any method name may be invoked. The server decides whether it exists.
#[derive(Clone)]
pub struct Facade<'c> {
    connection: &'c Connection,
    name: String,
    version: Option<u32>,
}

impl fmt::Debug for Facade<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl<'c> Facade<'c> {
    /// Binds a facade without checking the capability table.
    ///
    /// Unknown names or versions are reported by the server as
    /// [`Error::UnimplementedMethod`] on the first call. Prefer
    /// [`Connection::facade`], which checks them up front.
    #[inline]
    #[must_use]
    pub fn unchecked(connection: &'c Connection, name: impl Into<String>, version: Option<u32>) -> Self {
        Self {
            connection,
            name: name.into(),
            version,
        }
    }

    /// Returns the facade name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the bound version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Calls `method` on this facade.
    ///
    /// Same as `connection.call(name, method, params, version)`.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value> {
        self.connection
            .call(&self.name, method, params, self.version)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
