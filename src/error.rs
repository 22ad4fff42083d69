//! Structured error types for lifecycle and scheduler operations.

use serde::Serialize;
use thiserror::Error;

/// Error kinds for programmatic error handling.
///
/// The API layer maps these 1:1 to user-visible statuses, so the set is
/// stable and enumerable.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Task, house, person, or instance absent.
    NotFound,
    /// Actor or target is not a house/group member.
    PreconditionFailed,
    /// Double-schedule attempt or already-open instance.
    Conflict,
    /// Responsible group has no members at materialization time.
    NoCandidates,
    /// Transport/transaction error from the persistence boundary.
    StoreFailure,
    /// Catch-all; always logged with context before surfacing.
    Unknown,
}

/// Structured error carried by every fallible core operation.
#[derive(Debug, Error, Serialize)]
#[error("{message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found: {}", entity, id))
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn no_candidates(group_id: &str) -> Self {
        Self::new(
            ErrorKind::NoCandidates,
            format!("Responsible group {} has no members", group_id),
        )
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::StoreFailure, err.to_string())
    }

    pub fn unknown(err: impl std::fmt::Display) -> Self {
        let err = CoreError::new(ErrorKind::Unknown, err.to_string());
        tracing::error!(error = %err.message, "unclassified core error");
        err
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::store(err)
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CoreError>() {
            Ok(core_err) => core_err,
            Err(err) => CoreError::unknown(err),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
