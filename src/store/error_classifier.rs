//! Error Classifier
//!
//! Sorts store failures into "not yet loadable" (worth retrying once other
//! tables have loaded) and "never loadable".

use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a failed append may succeed on a later attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryReason {
    /// A constraint (usually a foreign key) rejected the rows.
    Constraint,
    /// The target or a referenced table does not exist.
    MissingTable,
    /// Any other operational failure reported by the store.
    Operational,
}

/// Classification of one failed append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Retryable(RetryReason),
    Unrecoverable,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Retryable(_))
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Constraint => write!(f, "Constraint"),
            RetryReason::MissingTable => write!(f, "MissingTable"),
            RetryReason::Operational => write!(f, "Operational"),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Retryable(reason) => write!(f, "Retryable({})", reason),
            FailureKind::Unrecoverable => write!(f, "Unrecoverable"),
        }
    }
}

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a SQLite error by its primary result code.
    pub fn classify(&self, error: &rusqlite::Error) -> FailureKind {
        let code = match error.sqlite_error_code() {
            Some(code) => code,
            None => return FailureKind::Unrecoverable,
        };

        match code {
            ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch => {
                FailureKind::Retryable(RetryReason::Constraint)
            }
            ErrorCode::Unknown => {
                let msg = error.to_string().to_lowercase();
                if msg.contains("no such table") {
                    FailureKind::Retryable(RetryReason::MissingTable)
                } else {
                    FailureKind::Retryable(RetryReason::Operational)
                }
            }
            ErrorCode::PermissionDenied
            | ErrorCode::OperationAborted
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::ReadOnly
            | ErrorCode::OperationInterrupted
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::CannotOpen
            | ErrorCode::FileLockingProtocolFailed
            | ErrorCode::SchemaChanged => FailureKind::Retryable(RetryReason::Operational),
            _ => FailureKind::Unrecoverable,
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
