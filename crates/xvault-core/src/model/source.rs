//! Source domain types, the thing a backup pulls from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of remote a source connects to. Only `Ssh`/`Sftp` has a live
/// connector in the Worker; the rest are scaffolds (see `ConnectorError::NotImplemented`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Ssh,
    Sftp,
    Ftp,
    Mysql,
    Postgres,
    Wordpress,
}

impl SourceType {
    #[must_use]
    pub fn has_connector(self) -> bool {
        matches!(self, Self::Ssh | Self::Sftp)
    }
}

/// Lifecycle status of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Disabled,
}

/// A backup source: a tenant's remote system plus the non-secret
/// configuration needed to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub name: String,
    pub status: SourceStatus,
    /// Connector-specific non-secret configuration (host, port, remote paths, ...).
    pub config: serde_json::Value,
    pub credential_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
