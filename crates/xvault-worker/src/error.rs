//! Errors produced while executing a job's pipeline. Every variant maps to
//! an [`ErrorKind`] so `Reporter::complete` can send the Hub a stable
//! machine-readable code, matching the taxonomy in `xvault_core::error`.

use xvault_core::error::{ConnectorError, ErrorKind, StorageOpError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageOpError),

    #[error("crypto error: {0}")]
    Crypto(#[from] xvault_core::error::CryptoError),

    #[error("hub request failed: {0}")]
    HubRequest(String),

    #[error("lease lost: {0}")]
    LeaseLost(String),

    #[error("pipeline canceled")]
    Canceled,

    #[error("job payload/config error: {0}")]
    Validation(String),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connector(e) => e.kind(),
            Self::Storage(e) => e.kind(),
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::HubRequest(_) => ErrorKind::Network,
            Self::LeaseLost(_) => ErrorKind::LeaseLost,
            Self::Canceled => ErrorKind::Internal,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}
