//! Huddle Core - Shared types for the huddle chat server
//!
//! This crate provides the domain types shared between the wire
//! protocol (`huddle-protocol`) and the daemon (`huddled`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use session::{ConnectionId, SessionName, SessionState, SessionView, DEFAULT_MAX_NAME_LENGTH};
