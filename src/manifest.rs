//! Native messaging host manifest.
//!
//! Chrome discovers a native host through a small JSON manifest naming the
//! host, the executable to launch, and the extension origins allowed to
//! connect.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Registered name of this native messaging host.
pub const HOST_NAME: &str = "net.hu2ty.clay_relay";

/// Human-readable host description.
pub const HOST_DESCRIPTION: &str = "Clay relay";

/// Extension origins allowed to launch the host.
pub const ALLOWED_ORIGINS: &[&str] = &["chrome-extension://ofgodpngengnlbmpnjhondghmdeembik/"];

/// Errors from manifest generation.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The current executable path could not be resolved.
    #[error("unable to resolve current executable: {0}")]
    Executable(std::io::Error),

    /// The manifest file could not be written.
    #[error("unable to write manifest {path}: {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The manifest could not be serialized.
    #[error("unable to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The manifest document Chrome reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostManifest {
    /// Host name, matched against the extension's declared host.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Absolute path of the host executable.
    pub path: String,
    /// Transport type; always `"stdio"` for native messaging.
    #[serde(rename = "type")]
    pub transport: String,
    /// Extension origins allowed to connect.
    pub allowed_origins: Vec<String>,
}

impl HostManifest {
    /// Build the manifest for a given host executable.
    pub fn for_executable(executable: &Path) -> Self {
        Self {
            name: HOST_NAME.to_owned(),
            description: HOST_DESCRIPTION.to_owned(),
            path: executable.display().to_string(),
            transport: "stdio".to_owned(),
            allowed_origins: ALLOWED_ORIGINS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Write the manifest for the current executable to `path`.
///
/// An existing file is replaced; Chrome reads the manifest fresh on every
/// host launch.
///
/// # Errors
///
/// Returns a [`ManifestError`] if the executable path cannot be resolved
/// or the file cannot be written.
pub fn write_manifest(path: &Path) -> Result<(), ManifestError> {
    let executable = std::env::current_exe().map_err(ManifestError::Executable)?;
    let manifest = HostManifest::for_executable(&executable);
    let json = serde_json::to_vec(&manifest)?;
    std::fs::write(path, json).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })
}
