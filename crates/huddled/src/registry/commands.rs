//! Registry actor commands, errors, and outcomes.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RouteOutcome`: What happened to a routed line
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::net::SocketAddr;

use huddle_core::{ConnectionId, SessionName, SessionView};
use huddle_protocol::Message;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Outbound queue of a session, drained by that session's writer task.
///
/// Each item is one delivery line without its terminator.
pub type Outbox = mpsc::Sender<String>;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
///
/// # Usage
///
/// ```ignore
/// let (tx, rx) = oneshot::channel();
/// registry_tx.send(RegistryCommand::GetSession {
///     name,
///     respond_to: tx,
/// }).await?;
/// let session = rx.await?;
/// ```
#[derive(Debug)]
pub enum RegistryCommand {
    /// Add a session that just completed its handshake.
    ///
    /// # Errors
    /// - `RegistryError::NameTaken` if an active session already uses the name
    /// - `RegistryError::RegistryFull` if at maximum capacity
    Register {
        /// Display name from the handshake line
        name: SessionName,
        /// Connection the session runs on
        connection: ConnectionId,
        /// Remote address of the client
        peer: SocketAddr,
        /// Queue feeding the session's writer task
        outbox: Outbox,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Deliver a decoded line according to its command.
    ///
    /// Exit lines also remove the sender once the notice is queued.
    ///
    /// # Errors
    /// - `RegistryError::SessionNotFound` if the sender is no longer active
    Route {
        /// Connection the line arrived on
        connection: ConnectionId,
        /// The classified line (boxed to reduce enum size variance)
        message: Box<Message>,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<RouteOutcome, RegistryError>>,
    },

    /// Remove a session after its connection ended.
    ///
    /// # Errors
    /// - `RegistryError::SessionNotFound` if the name is absent or owned
    ///   by a different connection
    Deregister {
        /// Name the session registered under
        name: SessionName,
        /// Connection that owns the entry
        connection: ConnectionId,
        /// Why the session is leaving
        reason: RemovalReason,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Get a single session by name.
    ///
    /// Returns `None` if the session doesn't exist.
    GetSession {
        /// Name of the session to retrieve
        name: SessionName,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<SessionView>>,
    },

    /// Get all active sessions as views.
    ///
    /// Returns an empty vector if no sessions are registered.
    GetAllSessions {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<SessionView>>,
    },
}

// ============================================================================
// Route Outcome
// ============================================================================

/// Result of routing one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Recipients whose outbox accepted the delivery
    pub delivered: usize,
    /// Recipients skipped because their outbox was full or closed
    pub dropped: usize,
    /// The sender's session was removed and its connection must close
    pub close: bool,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has reached its maximum session capacity.
    #[error("registry is full (max: {max} sessions)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// An active session already uses this name.
    #[error("name already in use: {0}")]
    NameTaken(SessionName),

    /// The requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(SessionName),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Removal Reasons
// ============================================================================

/// Reason why a session was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Client sent the exit command.
    Exit,

    /// Client closed its side of the connection.
    Disconnected,

    /// A read or write on the connection failed.
    TransportFailed,

    /// Client violated the line protocol (e.g. an over-long line).
    ProtocolError,

    /// Server is shutting down.
    Shutdown,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit => write!(f, "client sent exit"),
            Self::Disconnected => write!(f, "client disconnected"),
            Self::TransportFailed => write!(f, "transport failure"),
            Self::ProtocolError => write!(f, "protocol violation"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}
