//! Configuration loading and validation.
//!
//! Loads relay configuration from `./clay-relay.toml` (or
//! `$CLAY_RELAY_CONFIG`). Environment variables override file values;
//! file values override defaults. A missing file just means defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::framing::DEFAULT_MAX_FRAME_BYTES;

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Viewer-facing server settings.
    pub server: ServerConfig,
    /// Bridge and framing settings.
    pub relay: BridgeConfig,
    /// Build-and-publish settings.
    pub publish: PublishConfig,
}

impl RelayConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: RelayConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file found, using defaults");
                Ok(RelayConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("CLAY_RELAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("clay-relay.toml"))
    }

    /// Apply environment variable overrides (env > file > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CLAY_RELAY_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(
                    var = "CLAY_RELAY_PORT",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("CLAY_RELAY_ALLOW_REMOTE") {
            match v.parse() {
                Ok(allow) => self.server.allow_remote = allow,
                Err(_) => tracing::warn!(
                    var = "CLAY_RELAY_ALLOW_REMOTE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("CLAY_RELAY_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(v);
        }
        if let Some(v) = env("CLAY_RELAY_PUBLISH_URL") {
            self.publish.base_url = v;
        }
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML does not parse.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: RelayConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

/// Viewer-facing server settings (`[server]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the WebSocket server listens on.
    pub port: u16,
    /// Bind all interfaces instead of loopback only.
    pub allow_remote: bool,
    /// Directory of static viewer assets served at `/`.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allow_remote: false,
            static_dir: PathBuf::from("public"),
        }
    }
}

/// Bridge and framing settings (`[relay]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum accepted native messaging frame size in bytes.
    pub max_frame_bytes: usize,
    /// Capacity of the extension-to-viewer queue. When no viewer is
    /// connected the queue fills and the stdin reader stalls.
    pub channel_buffer: usize,
    /// Tags advertised in the relay discovery file.
    pub tags: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            channel_buffer: default_channel_buffer(),
            tags: Vec::new(),
        }
    }
}

/// Build-and-publish settings (`[publish]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Compiler executable to invoke.
    pub compiler: String,
    /// Arguments passed to the compiler.
    pub compiler_args: Vec<String>,
    /// Environment variable selecting the target operating system.
    pub target_os_env: String,
    /// Target operating system value.
    pub target_os: String,
    /// Environment variable selecting the target architecture.
    pub target_arch_env: String,
    /// Target architecture value.
    pub target_arch: String,
    /// Artifact the compiler is expected to produce.
    pub artifact: PathBuf,
    /// Base URL of the artifact repository.
    pub base_url: String,
    /// Repository path segment under the base URL.
    pub repository: String,
    /// Environment variable carrying the CI execution number.
    pub run_env: String,
    /// Environment variable carrying the upload bearer token.
    pub token_env: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            compiler: "go".to_owned(),
            compiler_args: vec![
                "build".to_owned(),
                "-o".to_owned(),
                "clay-relay.exe".to_owned(),
            ],
            target_os_env: "GOOS".to_owned(),
            target_os: "windows".to_owned(),
            target_arch_env: "GOARCH".to_owned(),
            target_arch: "amd64".to_owned(),
            artifact: PathBuf::from("clay-relay.exe"),
            base_url: String::new(),
            repository: "clay-relay".to_owned(),
            run_env: "BUILD_NUMBER".to_owned(),
            token_env: "ARTIFACT_TOKEN".to_owned(),
        }
    }
}

fn default_port() -> u16 {
    3003
}

fn default_channel_buffer() -> usize {
    64
}
