//! Domain-specific error types following panic-free policy.

use crate::SessionState;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Handshake line was empty or whitespace only
    #[error("Session name is empty")]
    EmptyName,

    /// Handshake line exceeded the configured name limit
    #[error("Session name is {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Lifecycle edge that the state machine does not allow
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
