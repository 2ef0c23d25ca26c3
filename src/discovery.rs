//! Relay discovery file for the viewer.
//!
//! The viewer finds running relays by scanning its own user-data
//! directory for `relayinfo-<port>.json` files. Each running relay writes
//! one on startup and removes it on shutdown. The token inside lets the
//! viewer prove it is talking to the relay instance it discovered.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory name of the viewer application's user data.
pub const VIEWER_APP_NAME: &str = "clay-viewer";

/// Errors from writing or removing the discovery file.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The viewer user-data directory could not be determined.
    #[error("could not find app data path")]
    NoAppData,

    /// Filesystem operation failed.
    #[error("discovery file I/O failed on {path}: {source}")]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The relay info could not be serialized.
    #[error("unable to serialize relay info: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Contents of a `relayinfo-<port>.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayInfo {
    /// Port the relay's WebSocket server listens on.
    pub port: u16,
    /// Relay process id, for liveness checks by the viewer.
    pub process_id: u32,
    /// Free-form tags identifying this relay instance.
    pub tags: Vec<String>,
    /// Per-run authentication token.
    pub token: String,
}

impl RelayInfo {
    /// Build relay info for the current process with a fresh token.
    pub fn for_current_process(port: u16, tags: Vec<String>) -> Self {
        Self {
            port,
            process_id: std::process::id(),
            tags,
            token: Uuid::new_v4().to_string(),
        }
    }
}

/// Handle to a written discovery file; remove it on shutdown.
#[derive(Debug)]
pub struct RelayInfoFile {
    path: PathBuf,
}

impl RelayInfoFile {
    /// Write `relayinfo-<port>.json` into `dir`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if the directory cannot be created or
    /// the file cannot be written.
    pub fn write(dir: &Path, info: &RelayInfo) -> Result<Self, DiscoveryError> {
        if !dir.exists() {
            debug!(path = %dir.display(), "creating viewer user data path");
            std::fs::create_dir_all(dir).map_err(|source| DiscoveryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let path = dir.join(format!("relayinfo-{}.json", info.port));
        let json = serde_json::to_vec(info)?;
        std::fs::write(&path, json).map_err(|source| DiscoveryError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    /// Path of the written file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the discovery file.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if the file exists but cannot be
    /// removed.
    pub fn remove(self) -> Result<(), DiscoveryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => {
                warn!(path = %self.path.display(), error = %source, "could not remove relay info file");
                Err(DiscoveryError::Io {
                    path: self.path,
                    source,
                })
            }
        }
    }
}

/// Resolve the viewer's user-data directory for the current OS.
///
/// Windows: `%APPDATA%\clay-viewer`; macOS:
/// `~/Library/Application Support/clay-viewer`; Linux:
/// `~/.config/clay-viewer`.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoAppData`] when no per-user data root
/// exists.
pub fn viewer_data_dir() -> Result<PathBuf, DiscoveryError> {
    let base = directories::BaseDirs::new().ok_or(DiscoveryError::NoAppData)?;
    Ok(base.config_dir().join(VIEWER_APP_NAME))
}
