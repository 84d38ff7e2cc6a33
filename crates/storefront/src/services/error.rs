//! Service-layer error taxonomy.

use thiserror::Error;

use fastspot_core::{EmailError, TransitionError};

use crate::db::RepositoryError;

/// Errors returned by cart, checkout and recommendation operations.
///
/// Client-facing kinds carry a message that is safe to show as-is.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// The caller does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// The operation is not allowed in the resource's current state.
    #[error("{0}")]
    InvalidState(String),

    /// A concurrent write won; the caller may retry.
    #[error("{0}")]
    Conflict(String),

    /// A dependency (payment provider, reasoning service) failed.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The reasoning service answered with something unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(reason) => Self::Conflict(reason),
            other => Self::Repository(other),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

impl From<EmailError> for ServiceError {
    fn from(err: EmailError) -> Self {
        Self::Validation(format!("invalid email: {err}"))
    }
}
