//! huddle daemon - session registry, message router and TCP acceptor
//!
//! This crate provides the server side of the huddle chat protocol:
//! - `config` - Server configuration (TOML file plus defaults)
//! - `registry` - Session registry actor; the single source of truth for who is connected
//! - `router` - Decides which sessions receive a line
//! - `server` - TCP acceptor and per-connection handlers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      huddled daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │────▶│       RegistryActor         │   │
//! │  │ (TcpListener)   │     │   (session state owner)     │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ deliveries        │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │   per-session outbox        │   │
//! │  │  (per client)   │     │   (drained by writer task)  │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod registry;
pub mod router;
pub mod server;
