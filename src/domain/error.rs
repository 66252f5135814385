//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::ResponseId;

/// Domain errors represent structural misconfigurations of the response setup.
/// None of them are transient, so callers never retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("no value or gradient available for response: {0}")]
    MissingResponse(ResponseId),

    #[error("empty gradient field for response: {0}")]
    EmptyGradient(ResponseId),
}

impl DomainError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
