//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a local, deterministic rejection of a single requested
/// operation. Nothing here is transient, so nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A line or document field violates a numeric or shape precondition
    /// (negative amount, discount outside 0-100, unrecognised rate, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A requested status change is not in the transition table.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// An edit was attempted while the document's financial content is frozen.
    #[error("document is {status}; financial content cannot be edited")]
    DocumentLocked { status: String },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn illegal_transition(from: impl core::fmt::Display, to: impl core::fmt::Display) -> Self {
        Self::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn locked(status: impl core::fmt::Display) -> Self {
        Self::DocumentLocked {
            status: status.to_string(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// True for the precondition failures that the caller should surface as
    /// user-facing validation errors.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::IllegalTransition { .. } | Self::DocumentLocked { .. }
        )
    }
}
