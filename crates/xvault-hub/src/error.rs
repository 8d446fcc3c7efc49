//! HTTP error mapping. Every domain error from `xvault-core` lands on a
//! JSON body with a machine-readable `error` field and a human-readable
//! `message`, matching the error-kind taxonomy from spec.md §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use xvault_core::error::{ConnectorError, JobError, ScheduleError, VaultError};

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody { error: error_type, message };
        (status, axum::Json(body)).into_response()
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NoJob | JobError::NotFound { .. } => Self::NotFound(err.to_string()),
            JobError::NotLeaseHolder { .. } | JobError::AlreadyTerminal { .. } | JobError::Validation { .. } => {
                Self::BadRequest(err.to_string())
            }
            JobError::MaxAttemptsExceeded { .. } | JobError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::SourceUnavailable { .. } => Self::NotFound(err.to_string()),
            ScheduleError::InvalidTrigger | ScheduleError::InvalidCron { .. } | ScheduleError::InvalidTimezone { .. } => {
                Self::BadRequest(err.to_string())
            }
            ScheduleError::AlreadyScheduled { .. } => Self::Conflict(err.to_string()),
            ScheduleError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::CredentialNotFound { .. } => Self::NotFound(err.to_string()),
            VaultError::NoActiveKey { .. } | VaultError::Crypto(_) | VaultError::Store(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<ConnectorError> for AppError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::AuthFailed { .. } => Self::Unauthorized(err.to_string()),
            ConnectorError::NotFound { .. } => Self::NotFound(err.to_string()),
            ConnectorError::Network { .. } | ConnectorError::NotImplemented { .. } | ConnectorError::PartialFailure { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<xvault_storage::StoreError> for AppError {
    fn from(err: xvault_storage::StoreError) -> Self {
        match err {
            xvault_storage::StoreError::NotFound(msg) => Self::NotFound(msg),
            xvault_storage::StoreError::Database(msg) => Self::Internal(msg),
        }
    }
}
