//! Connection handler for individual client connections.
//!
//! Each accepted TCP connection gets its own `ConnectionHandler` that:
//! - Reads the handshake line and registers the session under that name
//! - Decodes every following line and hands it to the registry for routing
//! - Runs a writer task draining the session's outbox onto the socket
//! - Deregisters the session however the connection ends
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::{ConnectionId, DomainError, SessionName, SessionState};
use huddle_protocol::{CodecError, LineCodec, Message};

use crate::config::ServerConfig;
use crate::registry::{RegistryError, RegistryHandle, RemovalReason};

/// Per-connection limits, derived from `ServerConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub max_line_length: usize,
    pub max_name_length: usize,
    pub outbox_capacity: usize,
    pub write_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
            max_name_length: config.max_name_length,
            outbox_capacity: config.outbox_capacity,
            write_timeout: config.write_timeout(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

type WriterTask = JoinHandle<Result<(), ConnectionError>>;

/// Connection handler for a single client.
///
/// Manages the lifecycle of a client connection including:
/// - Name handshake
/// - Line processing loop
/// - Outbound delivery (via a writer task)
/// - Registry cleanup on exit, EOF, errors and shutdown
pub struct ConnectionHandler {
    /// Identifier assigned by the acceptor
    connection: ConnectionId,

    /// Remote address of the client
    peer: SocketAddr,

    /// Line-framed read half
    reader: FramedRead<OwnedReadHalf, LineCodec>,

    /// Write half, moved into the writer task after the handshake
    writer: Option<OwnedWriteHalf>,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Limits for this connection
    settings: ConnectionSettings,

    /// Cancelled when the server shuts down
    cancel_token: CancellationToken,

    /// Lifecycle state
    state: SessionState,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted TCP stream
    /// * `peer` - Remote address reported by `accept`
    /// * `connection` - Unique identifier for this connection
    /// * `registry` - Handle to the session registry
    /// * `settings` - Per-connection limits
    /// * `cancel_token` - Token cancelled on server shutdown
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        connection: ConnectionId,
        registry: RegistryHandle,
        settings: ConnectionSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let codec = LineCodec::with_max_length(settings.max_line_length);

        Self {
            connection,
            peer,
            reader: FramedRead::new(read_half, codec),
            writer: Some(write_half),
            registry,
            settings,
            cancel_token,
            state: SessionState::Handshaking,
        }
    }

    /// Runs the connection handler.
    ///
    /// This is the main entry point - performs the handshake then enters
    /// the line processing loop. Returns when the connection is finished.
    pub async fn run(mut self) {
        debug!(
            connection = %self.connection,
            peer = %self.peer,
            "New client connected"
        );

        let (name, writer) = match self.handle_handshake().await {
            Ok(registered) => registered,
            Err(e) => {
                self.log_handshake_failure(&e);
                self.advance(SessionState::Closing);
                self.advance(SessionState::Closed);
                return;
            }
        };

        self.advance(SessionState::Active);
        info!(
            name = %name,
            connection = %self.connection,
            peer = %self.peer,
            "Client handshake completed"
        );

        let reason = self.process_lines(&name, writer).await;
        self.advance(SessionState::Closing);

        // The exit path already removed the session inside the registry.
        if reason != RemovalReason::Exit {
            if let Err(e) = self
                .registry
                .deregister(name.clone(), self.connection, reason)
                .await
            {
                debug!(name = %name, error = %e, "Session was already removed");
            }
        }

        self.advance(SessionState::Closed);
        info!(
            name = %name,
            connection = %self.connection,
            reason = %reason,
            "Client disconnected"
        );
    }

    /// Handles the initial name handshake.
    ///
    /// The first line is the display name. Nothing is written back; on
    /// success the session is registered and its writer task is running.
    async fn handle_handshake(&mut self) -> Result<(SessionName, WriterTask), ConnectionError> {
        let line = self.read_line().await?;
        let name = SessionName::parse(&line, self.settings.max_name_length)?;

        let write_half = self.writer.take().ok_or(ConnectionError::WriterUnavailable)?;
        let (outbox, inbox) = mpsc::channel(self.settings.outbox_capacity);

        self.registry
            .register(name.clone(), self.connection, self.peer, outbox)
            .await?;

        let sink = FramedWrite::new(
            write_half,
            LineCodec::with_max_length(self.settings.max_line_length),
        );
        let writer = tokio::spawn(write_deliveries(sink, inbox, self.settings.write_timeout));

        Ok((name, writer))
    }

    /// Main line processing loop.
    ///
    /// Reads and routes lines until the session exits, the connection
    /// fails, or the server shuts down. Returns why the session ended.
    async fn process_lines(&mut self, name: &SessionName, mut writer: WriterTask) -> RemovalReason {
        loop {
            let line = tokio::select! {
                result = &mut writer => {
                    match result {
                        Ok(Ok(())) => debug!(name = %name, "Outbox closed"),
                        Ok(Err(e)) => debug!(name = %name, error = %e, "Delivery write failed"),
                        Err(e) => warn!(name = %name, error = %e, "Writer task aborted"),
                    }
                    return RemovalReason::TransportFailed;
                }
                line = self.read_line() => line,
            };

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    let reason = e.removal_reason();
                    if reason == RemovalReason::ProtocolError {
                        warn!(name = %name, error = %e, "Protocol violation, closing session");
                    } else {
                        debug!(name = %name, error = %e, "Connection closed");
                    }
                    return reason;
                }
            };

            // Empty lines carry nothing to route
            let Some(message) = Message::parse(name.clone(), line) else {
                continue;
            };

            match self.registry.route(self.connection, message).await {
                Ok(outcome) if outcome.close => return RemovalReason::Exit,
                Ok(_) => {}
                Err(RegistryError::SessionNotFound(_)) => {
                    debug!(name = %name, "Session no longer registered");
                    return RemovalReason::TransportFailed;
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "Registry unavailable");
                    return RemovalReason::Shutdown;
                }
            }
        }
    }

    /// Reads the next complete line from the client.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(ConnectionError::Shutdown),
            frame = self.reader.next() => match frame {
                Some(Ok(line)) => Ok(line),
                Some(Err(e)) => Err(e.into()),
                None => Err(ConnectionError::Eof),
            },
        }
    }

    /// Moves to `next`, logging instead of failing on an illegal edge.
    fn advance(&mut self, next: SessionState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => warn!(connection = %self.connection, error = %e, "Lifecycle error"),
        }
    }

    fn log_handshake_failure(&self, error: &ConnectionError) {
        match error {
            ConnectionError::Eof | ConnectionError::Shutdown => debug!(
                connection = %self.connection,
                peer = %self.peer,
                "Connection closed before handshake"
            ),
            _ => warn!(
                connection = %self.connection,
                peer = %self.peer,
                error = %error,
                "Handshake failed"
            ),
        }
    }
}

/// Drains `inbox` onto the socket until the registry drops the outbox.
///
/// Each delivery must complete within `write_timeout`. When the outbox
/// closes the write half is flushed and shut down, which the client
/// observes as end-of-stream.
async fn write_deliveries(
    mut sink: FramedWrite<OwnedWriteHalf, LineCodec>,
    mut inbox: mpsc::Receiver<String>,
    write_timeout: Duration,
) -> Result<(), ConnectionError> {
    while let Some(line) = inbox.recv().await {
        match timeout(write_timeout, sink.send(line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ConnectionError::WriteTimeout),
        }
    }

    sink.close().await.map_err(ConnectionError::from)
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid handshake: {0}")]
    Handshake(#[from] DomainError),

    #[error("Registration rejected: {0}")]
    Registry(#[from] RegistryError),

    #[error("Line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Server shutting down")]
    Shutdown,

    #[error("Writer already started")]
    WriterUnavailable,
}

impl ConnectionError {
    /// Maps a terminal error to the registry removal reason.
    pub fn removal_reason(&self) -> RemovalReason {
        match self {
            Self::Eof => RemovalReason::Disconnected,
            Self::Handshake(_) | Self::LineTooLong { .. } => RemovalReason::ProtocolError,
            Self::Shutdown => RemovalReason::Shutdown,
            Self::Registry(RegistryError::ChannelClosed) => RemovalReason::Shutdown,
            Self::Registry(_) | Self::Io(_) | Self::WriteTimeout | Self::WriterUnavailable => {
                RemovalReason::TransportFailed
            }
        }
    }
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::LineTooLong { max } => Self::LineTooLong { max },
            CodecError::Io(e) => Self::Io(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ServerConfig {
            max_line_length: 128,
            write_timeout_ms: 250,
            ..ServerConfig::default()
        };
        let settings = ConnectionSettings::from_config(&config);
        assert_eq!(settings.max_line_length, 128);
        assert_eq!(settings.write_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_codec_error_conversion() {
        let err: ConnectionError = CodecError::LineTooLong { max: 16 }.into();
        assert!(matches!(err, ConnectionError::LineTooLong { max: 16 }));
        assert_eq!(err.to_string(), "Line exceeds maximum length of 16 bytes");
    }

    #[test]
    fn test_removal_reasons() {
        assert_eq!(
            ConnectionError::Eof.removal_reason(),
            RemovalReason::Disconnected
        );
        assert_eq!(
            ConnectionError::LineTooLong { max: 1 }.removal_reason(),
            RemovalReason::ProtocolError
        );
        assert_eq!(
            ConnectionError::Io("reset".to_string()).removal_reason(),
            RemovalReason::TransportFailed
        );
        assert_eq!(
            ConnectionError::Shutdown.removal_reason(),
            RemovalReason::Shutdown
        );
        assert_eq!(
            ConnectionError::Handshake(DomainError::EmptyName).removal_reason(),
            RemovalReason::ProtocolError
        );
    }

    #[test]
    fn test_handshake_error_display() {
        let err = ConnectionError::from(RegistryError::NameTaken(SessionName::new("Bob")));
        assert_eq!(err.to_string(), "Registration rejected: name already in use: Bob");
    }
}
