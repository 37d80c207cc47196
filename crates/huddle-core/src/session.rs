//! Session domain entities and value objects.

use crate::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use std::borrow::Borrow;
use std::fmt;
use std::net::SocketAddr;

/// Default upper bound on a display name, in bytes.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 64;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Display name of a connected client.
///
/// Taken verbatim from the handshake line (newline already stripped).
/// Interior whitespace is preserved; names are compared byte-for-byte,
/// so `Bob` and `bob` are different sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionName(String);

impl SessionName {
    /// Creates a name without validation.
    ///
    /// Used for whisper targets, which are only looked up and never stored.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Validates a handshake line as a display name.
    ///
    /// # Errors
    ///
    /// - `DomainError::EmptyName` if the line is empty or whitespace only
    /// - `DomainError::NameTooLong` if the line exceeds `max_len` bytes
    pub fn parse(raw: &str, max_len: usize) -> DomainResult<Self> {
        if raw.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if raw.len() > max_len {
            return Err(DomainError::NameTooLong {
                len: raw.len(),
                max: max_len,
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of one accepted TCP connection.
///
/// Assigned by the acceptor from a monotonically increasing counter.
/// Two sessions that share a name over time never share a connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state of a session.
///
/// ```text
/// Handshaking ──▶ Active ──▶ Closing ──▶ Closed
///      │                        ▲
///      └────────────────────────┘
/// ```
///
/// A session is present in the registry if and only if it is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Connection accepted, waiting for the name line.
    #[default]
    Handshaking,
    /// Registered and routing lines.
    Active,
    /// Exit processed or connection severed; tearing down.
    Closing,
    /// Resources released.
    Closed,
}

impl SessionState {
    /// Returns true if `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Handshaking, Self::Active)
                | (Self::Handshaking, Self::Closing)
                | (Self::Active, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Returns the successor state if the edge is legal.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` for any other edge.
    pub fn transition(self, next: SessionState) -> DomainResult<SessionState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true once the session no longer accepts input.
    pub fn is_terminating(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Handshaking => "handshaking",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Read Model
// ============================================================================

/// Read-only snapshot of a registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub name: SessionName,
    pub connection: ConnectionId,
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
    /// Lines routed on behalf of this session
    pub messages_sent: u64,
    /// Deliveries to this session discarded because its outbox was full
    pub deliveries_dropped: u64,
}

impl SessionView {
    /// Seconds elapsed since the handshake completed.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.connected_at).num_seconds()
    }
}
