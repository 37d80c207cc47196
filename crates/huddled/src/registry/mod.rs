//! Session registry using Actor pattern.
//!
//! The registry is the single source of truth for who is connected. It
//! receives commands via a tokio mpsc channel, owns the name → session map,
//! and performs deliveries onto each session's outbox.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryActor  │────▶│ Session outboxes │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         │                       │                       │
//!         │   RegistryCommand     │   router::plan        │
//!         │   (mpsc channel)      │                       │
//!         ▼                       ▼                       ▼
//!    Register/Route/        HashMap<SessionName,     Writer task per
//!    Deregister             SessionEntry>            connection
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::{RegistryActor, MAX_SESSIONS};
pub use commands::{Outbox, RegistryCommand, RegistryError, RemovalReason, RouteOutcome};
pub use handle::RegistryHandle;

/// Channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// # Example
///
/// ```no_run
/// use huddled::registry::{spawn_registry, MAX_SESSIONS};
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(MAX_SESSIONS);
///     let sessions = handle.get_all_sessions().await;
///     assert!(sessions.is_empty());
/// }
/// ```
pub fn spawn_registry(max_sessions: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx, max_sessions);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
