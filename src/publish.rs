//! Build-and-publish pipeline.
//!
//! Reproduces the release automation as a subcommand: invoke the
//! configured compiler with the target OS/architecture selected through
//! two environment variables, then upload the produced binary to the
//! artifact repository with a single authenticated multipart POST. No
//! retries and no response parsing beyond the status check; a failed
//! step surfaces as a non-zero exit.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

use crate::config::PublishConfig;

/// HTTP connect timeout for the upload client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for the upload; artifacts can be large.
const UPLOAD_TIMEOUT_SECS: u64 = 300;

/// Errors from the publish pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The compiler could not be spawned.
    #[error("unable to run compiler '{command}': {source}")]
    CompilerSpawn {
        /// Compiler executable.
        command: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The compiler exited with a non-zero status.
    #[error("compiler exited with {status}: {stderr}")]
    CompilerFailed {
        /// Exit status description.
        status: String,
        /// Captured compiler stderr.
        stderr: String,
    },

    /// The compiler succeeded but the expected artifact is missing.
    #[error("expected artifact {0} was not produced")]
    ArtifactMissing(PathBuf),

    /// A required environment variable is unset or empty.
    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    /// The configured base URL is absent or unparseable.
    #[error("invalid artifact repository base URL '{0}'")]
    InvalidBaseUrl(String),

    /// The artifact file could not be read for upload.
    #[error("unable to read artifact {path}: {source}")]
    ArtifactRead {
        /// Artifact path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The upload request failed at the HTTP layer.
    #[error("upload request failed: {0}")]
    Upload(#[from] reqwest::Error),

    /// The repository answered with a non-success status.
    #[error("upload rejected with status {status}: {body}")]
    UploadRejected {
        /// HTTP status returned.
        status: StatusCode,
        /// Response body, for the CI log.
        body: String,
    },
}

/// Outcome of a publish run.
#[derive(Debug)]
pub struct PublishReport {
    /// Resolved compile command line.
    pub command: String,
    /// Artifact path.
    pub artifact: PathBuf,
    /// Upload destination.
    pub destination: Url,
    /// Whether the upload was actually performed (false on dry runs).
    pub uploaded: bool,
}

/// Drives the compile and upload steps.
pub struct Publisher {
    config: PublishConfig,
    client: reqwest::Client,
}

impl Publisher {
    /// Create a publisher from the `[publish]` config section.
    pub fn new(config: PublishConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self { config, client }
    }

    /// The resolved compile command line, for logs and dry runs.
    pub fn command_line(&self) -> String {
        let mut line = format!(
            "{}={} {}={} {}",
            self.config.target_os_env,
            self.config.target_os,
            self.config.target_arch_env,
            self.config.target_arch,
            self.config.compiler,
        );
        for arg in &self.config.compiler_args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Build the upload destination `<base>/<repository>/<run>/`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidBaseUrl`] when the base URL is
    /// empty, unparseable, or cannot carry path segments.
    pub fn destination(&self, run: &str) -> Result<Url, PublishError> {
        let base = &self.config.base_url;
        if base.is_empty() {
            return Err(PublishError::InvalidBaseUrl(base.clone()));
        }
        let mut url =
            Url::parse(base).map_err(|_| PublishError::InvalidBaseUrl(base.clone()))?;
        url.path_segments_mut()
            .map_err(|()| PublishError::InvalidBaseUrl(base.clone()))?
            .pop_if_empty()
            .push(&self.config.repository)
            .push(run)
            // Trailing slash: the repository treats the run segment as a
            // directory.
            .push("");
        Ok(url)
    }

    /// Compile the artifact with the configured toolchain.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] if the compiler cannot be spawned,
    /// exits non-zero, or does not produce the expected artifact.
    pub async fn compile(&self) -> Result<PathBuf, PublishError> {
        info!(command = %self.command_line(), "compiling artifact");
        let output = Command::new(&self.config.compiler)
            .args(&self.config.compiler_args)
            .env(&self.config.target_os_env, &self.config.target_os)
            .env(&self.config.target_arch_env, &self.config.target_arch)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| PublishError::CompilerSpawn {
                command: self.config.compiler.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PublishError::CompilerFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let artifact = self.config.artifact.clone();
        if !artifact.exists() {
            return Err(PublishError::ArtifactMissing(artifact));
        }
        Ok(artifact)
    }

    /// Upload the artifact with one bearer-authenticated multipart POST.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] if the artifact cannot be read, the
    /// request fails, or the repository answers non-success.
    pub async fn upload(
        &self,
        artifact: &Path,
        destination: Url,
        token: &str,
    ) -> Result<StatusCode, PublishError> {
        let bytes = tokio::fs::read(artifact)
            .await
            .map_err(|source| PublishError::ArtifactRead {
                path: artifact.to_path_buf(),
                source,
            })?;
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_owned());

        info!(url = %destination, bytes = bytes.len(), "uploading artifact");
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(destination)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::UploadRejected { status, body });
        }
        Ok(status)
    }

    /// Run the whole pipeline: compile, then exactly one upload.
    ///
    /// With `dry_run` the resolved command and destination are reported
    /// without executing either step.
    ///
    /// # Errors
    ///
    /// Returns the first [`PublishError`] encountered; a compile failure
    /// means no upload request is ever issued.
    pub async fn run(&self, dry_run: bool) -> Result<PublishReport, PublishError> {
        let run_number = resolve_env(&self.config.run_env)?;
        let destination = self.destination(&run_number)?;

        if dry_run {
            return Ok(PublishReport {
                command: self.command_line(),
                artifact: self.config.artifact.clone(),
                destination,
                uploaded: false,
            });
        }

        let token = resolve_env(&self.config.token_env)?;
        let artifact = self.compile().await?;
        let status = self.upload(&artifact, destination.clone(), &token).await?;
        info!(%status, url = %destination, "artifact published");

        Ok(PublishReport {
            command: self.command_line(),
            artifact,
            destination,
            uploaded: true,
        })
    }
}

/// Read a required environment variable, rejecting empty values.
fn resolve_env(var: &str) -> Result<String, PublishError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(PublishError::MissingEnv(var.to_owned())),
    }
}
