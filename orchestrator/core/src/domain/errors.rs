// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Transport-agnostic error kinds shared by every layer of the gateway.

use thiserror::Error;

/// The stable classification every `CoreError` carries. Each variant maps to
/// exactly one HTTP status code at the presentation boundary; nothing below
/// `presentation` should branch on status codes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    PreconditionFailed,
    PayloadTooLarge,
    QuotaExceeded,
    NotSupported,
    DriverError,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::QuotaExceeded => 413,
            ErrorKind::NotSupported => 501,
            ErrorKind::DriverError => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether the caller may safely retry the operation that produced this
    /// kind without risking duplicated side effects.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::DriverError)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("quota exceeded on {storage_config_id}: requested {requested}, available {available}")]
    QuotaExceeded {
        storage_config_id: String,
        requested: u64,
        available: u64,
    },

    #[error("capability {0:?} not supported by driver")]
    NotSupported(crate::domain::driver::Capability),

    #[error("driver error ({code}): {message}")]
    DriverError { code: String, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Unauthenticated => ErrorKind::Unauthenticated,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            CoreError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            CoreError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            CoreError::NotSupported(_) => ErrorKind::NotSupported,
            CoreError::DriverError { .. } => ErrorKind::DriverError,
            CoreError::Timeout(_) => ErrorKind::Timeout,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn retryable(&self) -> bool {
        self.kind().retryable()
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".into()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization: {err}"))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CoreError::Timeout(err.to_string())
        } else {
            CoreError::DriverError {
                code: err
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| "network".into()),
                message: err.to_string(),
            }
        }
    }
}

impl From<opendal::Error> for CoreError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind as OdKind;
        match err.kind() {
            OdKind::NotFound => CoreError::NotFound(err.to_string()),
            OdKind::AlreadyExists => CoreError::Conflict(err.to_string()),
            OdKind::PermissionDenied => CoreError::Forbidden(err.to_string()),
            OdKind::Unsupported => CoreError::NotSupported(crate::domain::driver::Capability::empty()),
            _ => CoreError::DriverError {
                code: format!("{:?}", err.kind()),
                message: err.to_string(),
            },
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
