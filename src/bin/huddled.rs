//! huddle daemon - line-oriented multi-client TCP chat server
//!
//! Every client sends its display name as the first line. After that each
//! line is relayed as `<name>: <line>` to every other client, or to a
//! single client when it starts with `@name`. `!exit` leaves the room.
//!
//! # Usage
//!
//! ```bash
//! # Listen on all interfaces, port 9555
//! huddled 9555
//!
//! # Listen on loopback only
//! huddled 9555 --bind 127.0.0.1
//!
//! # Load limits from a TOML file
//! huddled 9555 --config /etc/huddle.toml
//! HUDDLE_CONFIG=/etc/huddle.toml huddled 9555
//!
//! # Enable debug logging
//! RUST_LOG=huddled=debug huddled 9555
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use huddled::config::{ServerConfig, CONFIG_ENV_VAR};
use huddled::registry::spawn_registry;
use huddled::server::ChatServer;

/// huddle daemon - broadcast and whisper chat over TCP
#[derive(Parser, Debug)]
#[command(name = "huddled", version, about)]
struct Args {
    /// TCP port to listen on
    port: u16,

    /// Address to bind (default: all interfaces)
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// TOML configuration file (falls back to $HUDDLE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Builds the effective configuration: file first, then flags.
    fn resolve_config(&self) -> Result<ServerConfig> {
        let path = self
            .config
            .clone()
            .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let mut config = match path {
            Some(path) => ServerConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        config.port = self.port;
        if let Some(bind) = self.bind {
            config.bind = bind;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run_server(args) {
        eprintln!("huddled: {e:#}");
        process::exit(1);
    }
}

/// Runs the server (async entry point).
#[tokio::main]
async fn run_server(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("huddled=info".parse()?)
                .add_directive("huddle_protocol=info".parse()?),
        )
        .init();

    let config = args.resolve_config()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "huddle daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the session registry
    let registry = spawn_registry(config.max_sessions);
    info!(max_sessions = config.max_sessions, "Session registry started");

    let server = ChatServer::bind(&config, registry, cancel_token)
        .await
        .context("Failed to bind")?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("huddle daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
