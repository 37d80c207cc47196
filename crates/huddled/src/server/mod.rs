//! TCP acceptor for the huddle daemon.
//!
//! The server:
//! - Listens on a TCP port for client connections
//! - Spawns a ConnectionHandler for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ spawns                 │ outbox
//!         ▼                        ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   Writer task   │◀────│  mpsc::Sender   │
//! │   (per client)  │     │  (per session)  │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionSettings};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use huddle_core::ConnectionId;

use crate::config::ServerConfig;
use crate::registry::RegistryHandle;

/// TCP chat server.
///
/// Owns the listening socket; every accepted connection runs on its own task.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Limits handed to each connection
    settings: ConnectionSettings,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection IDs
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listening socket.
    ///
    /// Failing to bind is the only fatal error of the server.
    pub async fn bind(
        config: &ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            settings: ConnectionSettings::from_config(config),
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the listener is bound to.
    ///
    /// Useful when the configured port is 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(addr = %self.local_addr()?, "Chat server listening");

        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let id = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, ConnectionId::new(id));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, connection: ConnectionId) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = %connection, error = %e, "Failed to set TCP_NODELAY");
        }

        let handler = ConnectionHandler::new(
            stream,
            peer,
            connection,
            self.registry.clone(),
            self.settings,
            self.cancel_token.child_token(),
        );

        tokio::spawn(handler.run());
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}
