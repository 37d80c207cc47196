//! Registry actor - owns all session state and processes commands.
//!
//! The RegistryActor is the single owner of the session map in the system.
//! It receives commands via an mpsc channel and executes them one at a time,
//! which makes every lookup, insert, removal and delivery mutually exclusive.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use huddle_core::{ConnectionId, SessionName, SessionView};
use huddle_protocol::Message;

use super::commands::{Outbox, RegistryCommand, RegistryError, RemovalReason, RouteOutcome};
use crate::router;

/// Default maximum number of sessions the registry can hold.
pub const MAX_SESSIONS: usize = 100;

// ============================================================================
// Session Entry
// ============================================================================

/// Registry-side state of one active session.
#[derive(Debug)]
struct SessionEntry {
    connection: ConnectionId,
    peer: SocketAddr,
    connected_at: DateTime<Utc>,
    outbox: Outbox,
    messages_sent: u64,
    deliveries_dropped: u64,
}

impl SessionEntry {
    fn view(&self, name: &SessionName) -> SessionView {
        SessionView {
            name: name.clone(),
            connection: self.connection,
            peer: self.peer,
            connected_at: self.connected_at,
            messages_sent: self.messages_sent,
            deliveries_dropped: self.deliveries_dropped,
        }
    }
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all session state.
///
/// Implements the actor pattern: receives commands via mpsc channel and
/// processes them sequentially. A session is present in `sessions` exactly
/// while it is active.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// All state mutations and every delivery happen within this single task,
/// so a broadcast always sees one consistent membership.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Active sessions keyed by display name
    sessions: HashMap<SessionName, SessionEntry>,

    /// Capacity limit
    max_sessions: usize,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `max_sessions` - Maximum number of concurrently active sessions
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>, max_sessions: usize) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!(max_sessions = self.max_sessions, "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Registry actor stopped (sessions: {})",
            self.sessions.len()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                name,
                connection,
                peer,
                outbox,
                respond_to,
            } => {
                let result = self.handle_register(name, connection, peer, outbox);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Route {
                connection,
                message,
                respond_to,
            } => {
                let result = self.handle_route(connection, &message);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Deregister {
                name,
                connection,
                reason,
                respond_to,
            } => {
                let result = self.handle_deregister(name, connection, reason);
                let _ = respond_to.send(result);
            }
            RegistryCommand::GetSession { name, respond_to } => {
                let result = self.sessions.get(&name).map(|entry| entry.view(&name));
                let _ = respond_to.send(result);
            }
            RegistryCommand::GetAllSessions { respond_to } => {
                let result = self
                    .sessions
                    .iter()
                    .map(|(name, entry)| entry.view(name))
                    .collect();
                let _ = respond_to.send(result);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Handles session registration after a successful handshake.
    ///
    /// A name collision rejects the newcomer; the existing session is untouched.
    fn handle_register(
        &mut self,
        name: SessionName,
        connection: ConnectionId,
        peer: SocketAddr,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&name) {
            debug!(
                name = %name,
                connection = %connection,
                "Name already in use, rejecting registration"
            );
            return Err(RegistryError::NameTaken(name));
        }

        if self.sessions.len() >= self.max_sessions {
            warn!(
                name = %name,
                current = self.sessions.len(),
                max = self.max_sessions,
                "Registry is full, rejecting registration"
            );
            return Err(RegistryError::RegistryFull {
                max: self.max_sessions,
            });
        }

        self.sessions.insert(
            name.clone(),
            SessionEntry {
                connection,
                peer,
                connected_at: Utc::now(),
                outbox,
                messages_sent: 0,
                deliveries_dropped: 0,
            },
        );

        info!(
            name = %name,
            connection = %connection,
            peer = %peer,
            total_sessions = self.sessions.len(),
            "Session registered"
        );

        Ok(())
    }

    /// Handles routing of one line from an active session.
    fn handle_route(
        &mut self,
        connection: ConnectionId,
        message: &Message,
    ) -> Result<RouteOutcome, RegistryError> {
        let sender = message.sender();

        match self.sessions.get_mut(sender) {
            Some(entry) if entry.connection == connection => entry.messages_sent += 1,
            _ => return Err(RegistryError::SessionNotFound(sender.clone())),
        }

        let plan = router::plan(&self.sessions, message);
        let mut outcome = RouteOutcome::default();
        let mut severed = Vec::new();

        for recipient in &plan.recipients {
            let Some(entry) = self.sessions.get_mut(recipient) else {
                continue;
            };

            match entry.outbox.try_send(plan.payload.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    entry.deliveries_dropped += 1;
                    outcome.dropped += 1;
                    warn!(
                        sender = %sender,
                        recipient = %recipient,
                        dropped_total = entry.deliveries_dropped,
                        "Recipient outbox full, delivery dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    // Writer task is gone; the connection is dead.
                    outcome.dropped += 1;
                    severed.push(recipient.clone());
                }
            }
        }

        debug!(
            sender = %sender,
            kind = message.command().kind(),
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Line routed"
        );

        for name in severed {
            self.remove(&name, RemovalReason::TransportFailed);
        }

        if plan.close_sender {
            self.remove(sender, RemovalReason::Exit);
            outcome.close = true;
        }

        Ok(outcome)
    }

    /// Handles removal of a session by its owning connection.
    fn handle_deregister(
        &mut self,
        name: SessionName,
        connection: ConnectionId,
        reason: RemovalReason,
    ) -> Result<(), RegistryError> {
        match self.sessions.get(&name) {
            Some(entry) if entry.connection == connection => {
                self.remove(&name, reason);
                Ok(())
            }
            _ => Err(RegistryError::SessionNotFound(name)),
        }
    }

    /// Removes a session, dropping its outbox so the writer task drains and exits.
    fn remove(&mut self, name: &SessionName, reason: RemovalReason) {
        if let Some(entry) = self.sessions.remove(name) {
            let view = entry.view(name);
            info!(
                name = %name,
                connection = %entry.connection,
                reason = %reason,
                connected_secs = view.age_secs(Utc::now()),
                messages_sent = entry.messages_sent,
                remaining_sessions = self.sessions.len(),
                "Session removed"
            );
        }
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of sessions currently registered.
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
