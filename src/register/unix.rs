//! Registration on Linux and macOS: Chrome scans a per-user
//! `NativeMessagingHosts` directory for `<host>.json`.

use std::path::PathBuf;

use tracing::info;

use crate::manifest::{write_manifest, HOST_NAME};

use super::RegisterError;

/// Resolve the manifest path inside Chrome's per-user host directory.
///
/// # Errors
///
/// Returns [`RegisterError::NoHome`] if the home directory cannot be
/// determined, or [`RegisterError::UnsupportedOs`] on a Unix flavor
/// Chrome has no known manifest location for.
pub fn manifest_path() -> Result<PathBuf, RegisterError> {
    let base = directories::BaseDirs::new().ok_or(RegisterError::NoHome)?;
    let home = base.home_dir();
    let dir = if cfg!(target_os = "macos") {
        home.join("Library/Application Support/Google/Chrome/NativeMessagingHosts")
    } else if cfg!(target_os = "linux") {
        home.join(".config/google-chrome/NativeMessagingHosts")
    } else {
        return Err(RegisterError::UnsupportedOs(std::env::consts::OS));
    };
    Ok(dir.join(format!("{HOST_NAME}.json")))
}

/// Register the host: write the manifest into Chrome's host directory.
///
/// # Errors
///
/// Returns a [`RegisterError`] if the path cannot be resolved or the
/// manifest cannot be written.
pub fn register() -> Result<(), RegisterError> {
    let path = manifest_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RegisterError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_manifest(&path)?;
    info!(path = %path.display(), "host manifest registered");
    Ok(())
}

/// Unregister the host: remove the manifest if present.
///
/// Removing an absent manifest is a no-op.
///
/// # Errors
///
/// Returns a [`RegisterError`] if the path cannot be resolved or an
/// existing manifest cannot be removed.
pub fn unregister() -> Result<(), RegisterError> {
    let path = manifest_path()?;
    match std::fs::remove_file(&path) {
        Ok(()) => {
            info!(path = %path.display(), "host manifest removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(RegisterError::Io { path, source }),
    }
}
