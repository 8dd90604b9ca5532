//! Scoped CA certificate file.
//!
//! The TLS stack reads the server CA from a file. The PEM text from the
//! credential store is written to a temp file that lives as long as the
//! connection and is deleted when dropped.

// ============================================================================
// Imports
// ============================================================================

use std::io::Write;
use std::path::Path;

use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::error::Result;

// ============================================================================
// CaCertFile
// ============================================================================

/// A temporary `.pem` file holding the API server's CA certificate.
///
/// The file is removed (best effort) when this value is dropped.
#[derive(Debug)]
pub struct CaCertFile {
    file: NamedTempFile,
}

impl CaCertFile {
    /// Writes the certificate to a new temp file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be created
    /// or written.
    pub fn write(pem: impl AsRef<[u8]>) -> Result<Self> {
        let mut file = Builder::new()
            .prefix("juju-ca-")
            .suffix(".pem")
            .tempfile()?;
        file.write_all(pem.as_ref())?;
        file.flush()?;

        debug!(path = %file.path().display(), "Wrote CA certificate");
        Ok(Self { file })
    }

    /// Returns the path of the certificate file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// ============================================================================
// Tests
// ============================================================================
