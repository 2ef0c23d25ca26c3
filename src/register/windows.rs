//! Registration on Windows: the manifest sits next to the executable and
//! the registry key
//! `HKCU\Software\Google\Chrome\NativeMessagingHosts\<host>` points at it.

use std::path::PathBuf;

use tracing::info;
use winreg::enums::HKEY_CURRENT_USER;
use winreg::RegKey;

use crate::manifest::{write_manifest, ManifestError, HOST_NAME};

use super::RegisterError;

/// Registry subkey holding the manifest path for this host.
fn registry_subkey() -> String {
    format!("Software\\Google\\Chrome\\NativeMessagingHosts\\{HOST_NAME}")
}

/// Resolve the manifest path: `<host>.json` next to the executable.
///
/// # Errors
///
/// Returns a [`RegisterError`] if the executable path cannot be resolved.
pub fn manifest_path() -> Result<PathBuf, RegisterError> {
    let executable = std::env::current_exe()
        .map_err(|e| RegisterError::Manifest(ManifestError::Executable(e)))?;
    let dir = executable
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_default();
    Ok(dir.join(format!("{HOST_NAME}.json")))
}

/// Register the host: write the manifest and set the registry value.
///
/// The registry value name is empty, which Windows shows as `(Default)`.
///
/// # Errors
///
/// Returns a [`RegisterError`] if the manifest cannot be written or the
/// registry key cannot be created.
pub fn register() -> Result<(), RegisterError> {
    let path = manifest_path()?;
    write_manifest(&path)?;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _disposition) = hkcu
        .create_subkey(registry_subkey())
        .map_err(RegisterError::Registry)?;
    key.set_value("", &path.display().to_string())
        .map_err(RegisterError::Registry)?;

    info!(path = %path.display(), "host manifest registered");
    Ok(())
}

/// Unregister the host: delete the registry key and the manifest file.
///
/// Both removals tolerate the target already being absent.
///
/// # Errors
///
/// Returns a [`RegisterError`] on any other registry or filesystem
/// failure.
pub fn unregister() -> Result<(), RegisterError> {
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    match hkcu.delete_subkey(registry_subkey()) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(RegisterError::Registry(e)),
    }

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
