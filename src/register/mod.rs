//! Host registration with Chrome.
//!
//! `register` writes the host manifest where Chrome looks for it and, on
//! Windows, points the registry at it. `unregister` undoes both. The
//! per-OS differences live in [`unix`] and [`windows`].

use std::path::PathBuf;

use crate::manifest::ManifestError;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{manifest_path, register, unregister};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{manifest_path, register, unregister};

/// Errors from registering or unregistering the host.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// The manifest could not be generated or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The home directory could not be determined.
    #[error("cannot determine home directory")]
    NoHome,

    /// Filesystem operation failed.
    #[error("registration I/O failed on {path}: {source}")]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Windows registry operation failed.
    #[cfg(windows)]
    #[error("registry operation failed: {0}")]
    Registry(std::io::Error),

    /// This operating system has no known Chrome manifest location.
    #[error("unsupported os on this build: {0}")]
    UnsupportedOs(&'static str),
}
