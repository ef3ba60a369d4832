// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid operation state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
