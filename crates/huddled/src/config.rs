//! Server configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) is a
//! valid configuration. Command-line flags are applied on top by the binary.
//!
//! ```toml
//! bind = "127.0.0.1"
//! port = 9555
//! max_sessions = 16
//! max_line_length = 4096
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use huddle_core::DEFAULT_MAX_NAME_LENGTH;
use huddle_protocol::DEFAULT_MAX_LINE_LENGTH;

use crate::registry::MAX_SESSIONS;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV_VAR: &str = "HUDDLE_CONFIG";

/// Default port when neither the file nor the command line sets one.
pub const DEFAULT_PORT: u16 = 9555;

/// Default capacity of each session's outbound queue.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Default write timeout (10 seconds)
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Tunables for the chat server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind: IpAddr,
    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Maximum number of concurrently active sessions
    pub max_sessions: usize,
    /// Maximum line length in bytes, excluding the terminator
    pub max_line_length: usize,
    /// Maximum display name length in bytes
    pub max_name_length: usize,
    /// Deliveries buffered per session before new ones are dropped
    pub outbox_capacity: usize,
    /// Time allowed for one delivery write before the session is torn down
    pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_sessions: MAX_SESSIONS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects limits that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_sessions", self.max_sessions),
            ("max_line_length", self.max_line_length),
            ("max_name_length", self.max_name_length),
            ("outbox_capacity", self.outbox_capacity),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_name_length > self.max_line_length {
            return Err(ConfigError::Invalid {
                field: "max_name_length",
                reason: format!("cannot exceed max_line_length ({})", self.max_line_length),
            });
        }
        Ok(())
    }

    /// Address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
