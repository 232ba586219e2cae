//! Error types for identity reconciliation.
//!
//! Every failure carries an [`ErrorKind`] tag. The tag is what gets logged and
//! what the HTTP boundary uses to pick a status; the message text of store and
//! invariant errors never leaves the process.

use thiserror::Error;

/// Message returned to callers that submit neither an email nor a phone number.
pub const MISSING_IDENTITY_MESSAGE: &str = "Either email or phoneNumber is required";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Neither email nor phone number was supplied.
    #[error("{MISSING_IDENTITY_MESSAGE}")]
    MissingIdentity,

    /// The candidate cluster has no determinable primary.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Lost a race with another writer (busy, locked, constraint, stale row).
    /// The whole resolve is retried.
    #[error("contact store conflict: {0}")]
    Conflict(String),

    #[error("contact store failure: {0}")]
    Store(#[source] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used for logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvariantViolation,
    StoreConflict,
    StoreFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::InvariantViolation => "invariant_violation",
            Self::StoreConflict => "store_conflict",
            Self::StoreFailure => "store_failure",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingIdentity => ErrorKind::Validation,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Conflict(_) => ErrorKind::StoreConflict,
            Self::Store(_) => ErrorKind::StoreFailure,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the whole resolve may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::ConstraintViolation,
            ) => Self::Conflict(err.to_string()),
            _ => Self::Store(err),
        }
    }
}
