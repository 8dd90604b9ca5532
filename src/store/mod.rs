//! Local cache of environment connection details.
//!
//! Bootstrapping an environment leaves its API endpoints, CA certificate
//! and admin credentials under `$JUJU_HOME/environments`, in one of two
//! shapes:
//!
//! - `cache.yaml`: every environment, keyed by name, with server data
//!   shared between environments of the same controller
//! - `<name>.jenv`: a single environment's record
//!
//! The cache is consulted first; if it does not know the environment the
//! `.jenv` file is read instead.
//!
//! # Example
//!
//! ```no_run
//! use jujulib::store::ConfigStore;
//!
//! # fn example() -> jujulib::Result<()> {
//! let store = ConfigStore::new()?;
//! let info = store.connection_info("local")?;
//! println!("{} at {:?}", info.user, info.state_servers);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Named environment handle.
pub mod environment;

// ============================================================================
// Re-exports
// ============================================================================

pub use environment::{Environment, open_environment};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding the Juju home directory.
pub const JUJU_HOME_VAR: &str = "JUJU_HOME";

/// Name of the multi-environment cache file.
pub const CACHE_FILE: &str = "cache.yaml";

/// Juju home directory relative to the user's home.
const DEFAULT_JUJU_HOME: &str = ".juju";

/// Store directory relative to the Juju home.
const ENVIRONMENTS_DIR: &str = "environments";

// ============================================================================
// ConnectionInfo
// ============================================================================

/// Everything needed to connect to one environment.
///
/// Also the on-disk shape of a `.jenv` file; other keys in it are ignored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionInfo {
    /// User name, without the `user-` tag prefix.
    pub user: String,
    /// The user's password.
    pub password: String,
    /// Environment UUID.
    #[serde(default)]
    pub environ_uuid: String,
    /// Controller UUID.
    #[serde(default)]
    pub server_uuid: String,
    /// API server addresses as `host:port`.
    pub state_servers: Vec<String>,
    /// CA certificate in PEM form.
    pub ca_cert: String,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("user", &self.user)
            .field("environ_uuid", &self.environ_uuid)
            .field("server_uuid", &self.server_uuid)
            .field("state_servers", &self.state_servers)
            .finish_non_exhaustive()
    }
}

impl ConnectionInfo {
    /// Returns the auth tag for this user.
    #[inline]
    #[must_use]
    pub fn auth_tag(&self) -> String {
        format!("user-{}", self.user)
    }
}

// ============================================================================
// Cache File
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CacheFile {
    environment: BTreeMap<String, CachedEnvironment>,
    server_data: BTreeMap<String, CachedServer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CachedEnvironment {
    user: Option<String>,
    env_uuid: Option<String>,
    server_uuid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CachedServer {
    api_endpoints: Option<Vec<String>>,
    ca_cert: Option<String>,
    identities: BTreeMap<String, String>,
}

impl CacheFile {
    /// Joins the environment and server records, if both are complete.
    fn lookup(&self, name: &str) -> Option<ConnectionInfo> {
        let environment = self.environment.get(name)?;
        let user = environment.user.clone()?;
        let server_uuid = environment.server_uuid.clone()?;
        let server = self.server_data.get(&server_uuid)?;

        Some(ConnectionInfo {
            password: server.identities.get(&user)?.clone(),
            environ_uuid: environment.env_uuid.clone()?,
            state_servers: server.api_endpoints.clone()?,
            ca_cert: server.ca_cert.clone()?,
            server_uuid,
            user,
        })
    }
}

// ============================================================================
// ConfigStore
// ============================================================================

/// Reader for cached environment connection details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    directory: PathBuf,
}

impl ConfigStore {
    /// Opens the store in the default directory.
    ///
    /// That is `$JUJU_HOME/environments`, or `~/.juju/environments` when
    /// `JUJU_HOME` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let directory = Self::default_directory(env::var_os(JUJU_HOME_VAR), dirs::home_dir())?;
        Ok(Self::with_directory(directory))
    }

    /// Opens the store in an explicit directory.
    #[inline]
    #[must_use]
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Returns the store directory.
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Computes the store directory from `JUJU_HOME` and the home directory.
    ///
    /// A leading `~` in `juju_home` expands to `home`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `home` is needed but unknown.
    pub fn default_directory(juju_home: Option<OsString>, home: Option<PathBuf>) -> Result<PathBuf> {
        let home_required = || {
            home.clone().ok_or_else(|| {
                Error::config(format!(
                    "Cannot determine home directory; set {JUJU_HOME_VAR}"
                ))
            })
        };

        let juju_home = match juju_home.filter(|v| !v.is_empty()).map(PathBuf::from) {
            Some(path) => match path.strip_prefix("~") {
                Ok(rest) => home_required()?.join(rest),
                Err(_) => path,
            },
            None => home_required()?.join(DEFAULT_JUJU_HOME),
        };

        Ok(juju_home.join(ENVIRONMENTS_DIR))
    }

    /// Looks up the connection details of `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::EnvironmentNotBootstrapped`] if neither the cache nor a
    ///   `.jenv` file knows the environment
    /// - [`Error::Yaml`] or [`Error::Io`] if an existing file is unreadable
    pub fn connection_info(&self, name: &str) -> Result<ConnectionInfo> {
        let cache_path = self.directory.join(CACHE_FILE);
        if cache_path.exists() {
            if let Some(info) = Self::read_cache(&cache_path)?.lookup(name) {
                debug!(environment = name, path = %cache_path.display(), "Found environment in cache");
                return Ok(info);
            }
            debug!(environment = name, "Environment not in cache, trying jenv");
        }

        let jenv_path = self.jenv_path(name);
        if !jenv_path.exists() {
            return Err(Error::environment_not_bootstrapped(name));
        }

        let info = serde_yaml::from_str(&fs::read_to_string(&jenv_path)?)?;
        debug!(environment = name, path = %jenv_path.display(), "Read environment from jenv");
        Ok(info)
    }

    /// Returns the path of the `.jenv` file for `name`.
    #[inline]
    #[must_use]
    pub fn jenv_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.jenv"))
    }

    fn read_cache(path: &Path) -> Result<CacheFile> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(CacheFile::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn sample() -> ConnectionInfo {
        ConnectionInfo {
            user: "tester".into(),
            password: "sekrit".into(),
            environ_uuid: "some-uuid".into(),
            server_uuid: "server-uuid".into(),
            state_servers: vec!["localhost:12345".into()],
            ca_cert: "test-cert".into(),
        }
    }

    fn store_dir() -> (TempDir, ConfigStore) {
        let dir = TempDir::with_prefix("jujulib-store-").expect("temp dir");
        let store = ConfigStore::with_directory(dir.path());
        (dir, store)
    }

    fn write_jenv(store: &ConfigStore, name: &str, info: &ConnectionInfo) {
        let yaml = serde_yaml::to_string(info).expect("yaml");
        fs::write(store.jenv_path(name), yaml).expect("write jenv");
    }

    fn write_cache(store: &ConfigStore, name: &str, info: &ConnectionInfo) {
        let yaml = format!(
            "environment:\n  {name}:\n    env-uuid: {env}\n    server-uuid: {srv}\n    user: {user}\n\
             server-data:\n  {srv}:\n    api-endpoints:\n    - {addr}\n    ca-cert: {cert}\n    identities:\n      {user}: {pw}\n",
            env = info.environ_uuid,
            srv = info.server_uuid,
            user = info.user,
            addr = info.state_servers[0],
            cert = info.ca_cert,
            pw = info.password,
        );
        fs::write(store.directory().join(CACHE_FILE), yaml).expect("write cache");
    }

    #[test]
    fn test_default_directory_uses_juju_home() {
        let dir = ConfigStore::default_directory(Some("/test/juju/home".into()), None)
            .expect("directory");
        assert_eq!(dir, PathBuf::from("/test/juju/home/environments"));
    }

    #[test]
    fn test_default_directory_through_home() {
        let dir = ConfigStore::default_directory(None, Some("/test/home".into()))
            .expect("directory");
        assert_eq!(dir, PathBuf::from("/test/home/.juju/environments"));
    }

    #[test]
    fn test_default_directory_expands_tilde() {
        let dir = ConfigStore::default_directory(Some("~/juju".into()), Some("/test/home".into()))
            .expect("directory");
        assert_eq!(dir, PathBuf::from("/test/home/juju/environments"));
    }

    #[test]
    fn test_default_directory_without_home() {
        let result = ConfigStore::default_directory(None, None);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_directory_set() {
        let store = ConfigStore::with_directory("/use/this/dir");
        assert_eq!(store.directory(), Path::new("/use/this/dir"));
    }

    #[test]
    fn test_env_missing() {
        let (_dir, store) = store_dir();
        let err = store.connection_info("missing").unwrap_err();
        assert!(matches!(
            err,
            Error::EnvironmentNotBootstrapped { ref environment } if environment == "missing"
        ));
    }

    #[test]
    fn test_parse_jenv() {
        let (_dir, store) = store_dir();
        write_jenv(&store, "test-env", &sample());

        let info = store.connection_info("test-env").expect("info");
        assert_eq!(info, sample());
    }

    #[test]
    fn test_parse_jenv_ignores_extra_keys() {
        let (_dir, store) = store_dir();
        let yaml = "user: tester\npassword: sekrit\nenviron-uuid: some-uuid\n\
                    state-servers:\n- localhost:12345\nca-cert: test-cert\nbootstrap-config:\n  name: x\n";
        fs::write(store.jenv_path("test-env"), yaml).expect("write jenv");

        let info = store.connection_info("test-env").expect("info");
        assert_eq!(info.user, "tester");
        assert_eq!(info.server_uuid, "");
    }

    #[test]
    fn test_parse_cache_file() {
        let (_dir, store) = store_dir();
        write_cache(&store, "test-env", &sample());

        let info = store.connection_info("test-env").expect("info");
        assert_eq!(info, sample());
    }

    #[test]
    fn test_cache_file_missing_env() {
        let (_dir, store) = store_dir();
        write_cache(&store, "test-env", &sample());

        let err = store.connection_info("missing").unwrap_err();
        assert!(matches!(err, Error::EnvironmentNotBootstrapped { .. }));
    }

    #[test]
    fn test_cache_file_first() {
        let (_dir, store) = store_dir();
        let mut content = sample();
        write_jenv(&store, "test-env", &content);
        content.password = "new-password".into();
        write_cache(&store, "test-env", &content);

        let info = store.connection_info("test-env").expect("info");
        assert_eq!(info, content);
    }

    #[test]
    fn test_cache_miss_falls_back_to_jenv() {
        let (_dir, store) = store_dir();
        write_cache(&store, "other-env", &sample());
        write_jenv(&store, "test-env", &sample());

        let info = store.connection_info("test-env").expect("info");
        assert_eq!(info, sample());
    }

    #[test]
    fn test_empty_cache_falls_back_to_jenv() {
        let (_dir, store) = store_dir();
        fs::write(store.directory().join(CACHE_FILE), "").expect("write cache");
        write_jenv(&store, "test-env", &sample());

        assert_eq!(store.connection_info("test-env").expect("info"), sample());
    }

    #[test]
    fn test_auth_tag() {
        assert_eq!(sample().auth_tag(), "user-tester");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("sekrit"));
        assert!(!debug.contains("test-cert"));
    }
}
