//! Scaffold: no Postgres dump connector ships in v0 (spec.md §4.5).

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use xvault_core::error::ConnectorError;

use super::{Connector, ContentSummary};

pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    async fn pull(
        &self,
        _source_config: &serde_json::Value,
        _credential_plaintext: &[u8],
        _dest_dir: &Path,
        _cancel: &CancellationToken,
    ) -> Result<ContentSummary, ConnectorError> {
        Err(ConnectorError::NotImplemented { source_type: "postgres".to_owned() })
    }
}
