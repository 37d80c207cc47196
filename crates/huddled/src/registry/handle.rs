//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor from connection handlers.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};

use huddle_core::{ConnectionId, SessionName, SessionView};
use huddle_protocol::Message;

use super::commands::{Outbox, RegistryCommand, RegistryError, RemovalReason, RouteOutcome};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// // Clone the handle into each connection task
/// let handle = registry_handle.clone();
///
/// // Register after the handshake
/// handle.register(name, connection, peer, outbox).await?;
///
/// // Route each decoded line
/// let outcome = handle.route(connection, message).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Sends a command built around a fresh oneshot and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Register a session that completed its handshake.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameTaken` if an active session already uses the name
    /// - `RegistryError::RegistryFull` if the registry is at maximum capacity
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        name: SessionName,
        connection: ConnectionId,
        peer: SocketAddr,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        self.request(|respond_to| RegistryCommand::Register {
            name,
            connection,
            peer,
            outbox,
            respond_to,
        })
        .await?
    }

    /// Route one classified line from the session on `connection`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the sender is no longer active
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn route(
        &self,
        connection: ConnectionId,
        message: Message,
    ) -> Result<RouteOutcome, RegistryError> {
        self.request(|respond_to| RegistryCommand::Route {
            connection,
            message: Box::new(message),
            respond_to,
        })
        .await?
    }

    /// Remove the session owned by `connection`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the session is gone or owned elsewhere
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn deregister(
        &self,
        name: SessionName,
        connection: ConnectionId,
        reason: RemovalReason,
    ) -> Result<(), RegistryError> {
        self.request(|respond_to| RegistryCommand::Deregister {
            name,
            connection,
            reason,
            respond_to,
        })
        .await?
    }

    /// Get a single session by name.
    ///
    /// Returns `None` if the session doesn't exist or if communication
    /// with the actor fails.
    pub async fn get_session(&self, name: SessionName) -> Option<SessionView> {
        self.request(|respond_to| RegistryCommand::GetSession { name, respond_to })
            .await
            .ok()?
    }

    /// Get all active sessions as views.
    ///
    /// Returns an empty vector if no sessions are registered or if
    /// communication with the actor fails.
    pub async fn get_all_sessions(&self) -> Vec<SessionView> {
        self.request(|respond_to| RegistryCommand::GetAllSessions { respond_to })
            .await
            .unwrap_or_default()
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
