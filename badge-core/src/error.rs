//! Error types for card document operations.

use thiserror::Error;

/// Result type for card document operations.
pub type CardResult<T> = Result<T, CardError>;

/// Errors that can occur in card document operations.
///
/// Every variant except [`CardError::Serialization`] is raised before the
/// document is touched, so callers can surface it as inline feedback and keep
/// editing.
#[derive(Debug, Error)]
pub enum CardError {
    /// A value would violate a document invariant.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Element or variable not found in the project.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the current editor state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Project serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CardError {
    /// Shorthand for a validation failure.
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the error is one the editor reports as a silent no-op.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
