//! The one connector required end-to-end for v0 (spec.md §4.5).
//!
//! Authenticates over SSH (password or private key, selected by a source
//! config flag), opens an SFTP subsystem channel, and recursively mirrors
//! each configured remote path into `dest_dir/source-mirror/<path>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use xvault_core::error::ConnectorError;

use super::{Connector, ContentSummary};

/// Bounds the initial TCP connect + SSH handshake (spec.md §4.5, design 10s).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How many individual per-file errors are surfaced before the rest are
/// folded into a single aggregate (spec.md §4.5).
const MAX_INDIVIDUAL_ERRORS: usize = 3;

#[derive(Debug, Deserialize)]
struct SshSourceConfig {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    /// `"password"` or `"private_key"`. The credential plaintext itself
    /// carries the secret; this only selects how to interpret it.
    #[serde(default = "default_auth_method")]
    auth_method: String,
    remote_paths: Vec<String>,
    /// Reject symlinks pointing outside the mirrored root rather than
    /// following them (spec.md §4.5 design default).
    #[serde(default)]
    follow_symlinks: bool,
    /// Expected host key fingerprint (`SHA256:...`). Required unless the
    /// worker was started with `WORKER_ALLOW_INSECURE_HOST_KEYS=true`.
    known_host_fingerprint: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_auth_method() -> String {
    "password".to_owned()
}

pub struct SshSftpConnector {
    allow_insecure_host_keys: bool,
}

impl SshSftpConnector {
    #[must_use]
    pub fn new(allow_insecure_host_keys: bool) -> Self {
        Self { allow_insecure_host_keys }
    }
}

#[async_trait]
impl Connector for SshSftpConnector {
    async fn pull(
        &self,
        source_config: &serde_json::Value,
        credential_plaintext: &[u8],
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ContentSummary, ConnectorError> {
        let config: SshSourceConfig = serde_json::from_value(source_config.clone())
            .map_err(|e| ConnectorError::Network { reason: format!("invalid source config: {e}") })?;

        if config.known_host_fingerprint.is_none() && !self.allow_insecure_host_keys {
            return Err(ConnectorError::Network {
                reason: "known_host_fingerprint is required unless insecure host-key mode is enabled".to_owned(),
            });
        }
        if config.known_host_fingerprint.is_none() {
            warn!(host = %config.host, "connecting without host-key verification (insecure mode)");
        }

        let handler = HostKeyVerifier {
            expected_fingerprint: config.known_host_fingerprint.clone(),
            insecure: self.allow_insecure_host_keys,
        };

        let ssh_config = Arc::new(russh::client::Config::default());
        let addr = (config.host.as_str(), config.port);

        let mut session = tokio::time::timeout(CONNECT_TIMEOUT, russh::client::connect(ssh_config, addr, handler))
            .await
            .map_err(|_| ConnectorError::Network { reason: format!("connect to {}:{} timed out", config.host, config.port) })?
            .map_err(|e| ConnectorError::Network { reason: e.to_string() })?;

        authenticate(&mut session, &config, credential_plaintext).await?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| ConnectorError::Network { reason: format!("channel open failed: {e}") })?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ConnectorError::Network { reason: format!("sftp subsystem request failed: {e}") })?;

        let sftp = russh_sftp::client::SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ConnectorError::Network { reason: format!("sftp handshake failed: {e}") })?;

        let mirror_root = dest_dir.join("source-mirror");
        let mut summary = ContentSummary::default();
        let mut errors: Vec<String> = Vec::new();

        for remote_path in &config.remote_paths {
            if cancel.is_cancelled() {
                return Err(ConnectorError::Network { reason: "canceled".to_owned() });
            }
            mirror_path(&sftp, remote_path, &mirror_root, config.follow_symlinks, cancel, &mut summary, &mut errors).await?;
        }

        if !errors.is_empty() {
            if errors.len() > MAX_INDIVIDUAL_ERRORS {
                return Err(ConnectorError::PartialFailure { count: errors.len(), first: errors[0].clone() });
            }
            return Err(ConnectorError::PartialFailure { count: errors.len(), first: errors.join("; ") });
        }

        Ok(summary)
    }
}

#[allow(clippy::too_many_arguments)]
async fn mirror_path(
    sftp: &russh_sftp::client::SftpSession,
    remote_path: &str,
    mirror_root: &Path,
    follow_symlinks: bool,
    cancel: &CancellationToken,
    summary: &mut ContentSummary,
    errors: &mut Vec<String>,
) -> Result<(), ConnectorError> {
    let metadata = sftp
        .metadata(remote_path)
        .await
        .map_err(|_| ConnectorError::NotFound { path: remote_path.to_owned() })?;

    let local_root = mirror_root.join(remote_path.trim_start_matches('/'));

    if metadata.is_dir() {
        mirror_dir(sftp, remote_path, &local_root, follow_symlinks, cancel, summary, errors).await
    } else {
        mirror_file(sftp, remote_path, &local_root, summary, errors).await;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn mirror_dir<'a>(
    sftp: &'a russh_sftp::client::SftpSession,
    remote_dir: &'a str,
    local_dir: &'a Path,
    follow_symlinks: bool,
    cancel: &'a CancellationToken,
    summary: &'a mut ContentSummary,
    errors: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ConnectorError>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|e| ConnectorError::Network { reason: format!("mkdir {}: {e}", local_dir.display()) })?;

        let entries = sftp
            .read_dir(remote_dir)
            .await
            .map_err(|e| ConnectorError::Network { reason: format!("readdir {remote_dir}: {e}") })?;

        for entry in entries {
            if cancel.is_cancelled() {
                return Err(ConnectorError::Network { reason: "canceled".to_owned() });
            }
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let remote_child = format!("{}/{name}", remote_dir.trim_end_matches('/'));
            let local_child = local_dir.join(&name);

            let file_type = entry.file_type();
            if file_type.is_symlink() && !follow_symlinks {
                summary.files_skipped += 1;
                continue;
            }
            if file_type.is_dir() {
                mirror_dir(sftp, &remote_child, &local_child, follow_symlinks, cancel, summary, errors).await?;
            } else {
                mirror_file(sftp, &remote_child, &local_child, summary, errors).await;
            }
        }
        Ok(())
    })
}

async fn mirror_file(
    sftp: &russh_sftp::client::SftpSession,
    remote_path: &str,
    local_path: &Path,
    summary: &mut ContentSummary,
    errors: &mut Vec<String>,
) {
    match mirror_file_inner(sftp, remote_path, local_path).await {
        Ok(bytes) => {
            summary.files_pulled += 1;
            summary.bytes_pulled += bytes;
        }
        Err(e) => errors.push(format!("{remote_path}: {e}")),
    }
}

async fn mirror_file_inner(sftp: &russh_sftp::client::SftpSession, remote_path: &str, local_path: &Path) -> std::io::Result<u64> {
    let mut remote_file = sftp
        .open(remote_path)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut local_file = tokio::fs::File::create(local_path).await?;

    let bytes = tokio::io::copy(&mut remote_file, &mut local_file).await?;
    local_file.flush().await?;
    Ok(bytes)
}

async fn authenticate(
    session: &mut russh::client::Handle<HostKeyVerifier>,
    config: &SshSourceConfig,
    credential_plaintext: &[u8],
) -> Result<(), ConnectorError> {
    let authenticated = if config.auth_method == "private_key" {
        let pem = std::str::from_utf8(credential_plaintext)
            .map_err(|_| ConnectorError::AuthFailed { reason: "private key credential is not valid UTF-8".to_owned() })?;
        let key_pair = russh_keys::decode_secret_key(pem, None)
            .map_err(|e| ConnectorError::AuthFailed { reason: format!("invalid private key: {e}") })?;
        session
            .authenticate_publickey(&config.username, Arc::new(key_pair))
            .await
            .map_err(|e| ConnectorError::Network { reason: e.to_string() })?
    } else {
        let password = std::str::from_utf8(credential_plaintext)
            .map_err(|_| ConnectorError::AuthFailed { reason: "password credential is not valid UTF-8".to_owned() })?;
        session
            .authenticate_password(&config.username, password)
            .await
            .map_err(|e| ConnectorError::Network { reason: e.to_string() })?
    };

    if authenticated {
        Ok(())
    } else {
        Err(ConnectorError::AuthFailed { reason: format!("{} rejected by {}", config.auth_method, config.host) })
    }
}

/// Verifies the remote host key against the source's pinned fingerprint.
/// In insecure mode (development only), every connection accepted this way
/// is logged at `warn` by the caller before the handshake even starts.
struct HostKeyVerifier {
    expected_fingerprint: Option<String>,
    insecure: bool,
}

#[async_trait]
impl russh::client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &russh_keys::key::PublicKey) -> Result<bool, Self::Error> {
        let Some(expected) = &self.expected_fingerprint else {
            return Ok(self.insecure);
        };
        let actual = server_public_key.fingerprint();
        Ok(actual == *expected)
    }
}
