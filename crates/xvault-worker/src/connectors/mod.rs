//! ConnectorRegistry (spec.md §4.5): one [`Connector`] implementation per
//! [`SourceType`]. Only SSH/SFTP is wired end-to-end for v0; the rest are
//! scaffolds that report [`ConnectorError::NotImplemented`].

mod ftp;
mod mysql;
mod postgres;
mod ssh_sftp;
mod wordpress;

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use xvault_core::error::ConnectorError;
use xvault_core::model::source::SourceType;

/// Aggregate statistics about a completed pull, folded into the job's
/// manifest by the Packager stage.
#[derive(Debug, Clone, Default)]
pub struct ContentSummary {
    pub files_pulled: u64,
    pub bytes_pulled: u64,
    pub files_skipped: u64,
}

/// The contract every connector implements: mirror a remote source into
/// `dest_dir` and return what it moved.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Pull the configured remote path(s) into `dest_dir`, respecting
    /// `cancel` at file/chunk boundaries (spec.md §5).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::AuthFailed`] if the credential is rejected,
    /// [`ConnectorError::Network`] on transient connection failure,
    /// [`ConnectorError::NotFound`] if a configured remote path is missing,
    /// or [`ConnectorError::PartialFailure`] if more than a few individual
    /// files fail after the pull is otherwise underway.
    async fn pull(
        &self,
        source_config: &serde_json::Value,
        credential_plaintext: &[u8],
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ContentSummary, ConnectorError>;
}

/// Resolve the connector for a source type. v0 has a live implementation
/// only for `Ssh`/`Sftp`; other types return a scaffold whose `pull` always
/// reports [`ConnectorError::NotImplemented`].
#[must_use]
pub fn resolve(source_type: SourceType, allow_insecure_host_keys: bool) -> Box<dyn Connector> {
    match source_type {
        SourceType::Ssh | SourceType::Sftp => Box::new(ssh_sftp::SshSftpConnector::new(allow_insecure_host_keys)),
        SourceType::Ftp => Box::new(ftp::FtpConnector),
        SourceType::Mysql => Box::new(mysql::MysqlConnector),
        SourceType::Postgres => Box::new(postgres::PostgresConnector),
        SourceType::Wordpress => Box::new(wordpress::WordpressConnector),
    }
}
