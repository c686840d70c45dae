//! wsock echo server: entry point.
//!
//! Accepts WebSocket clients of either protocol era on one path, greets each
//! one, and echoes every text message back until the client closes.
//!
//! # Usage
//!
//! ```text
//! wsock-echo [OPTIONS]
//!
//! Options:
//!   --config   <FILE>   TOML configuration file
//!   --bind     <ADDR>   Listener address          [default: from config]
//!   --path     <PATH>   Upgrade path              [default: from config]
//!   --greeting <TEXT>   First message to clients  [default: from config]
//!   --max-payload-len <BYTES>
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence over environment variables, which take
//! precedence over the configuration file.
//!
//! | Variable                | Description                    |
//! |-------------------------|--------------------------------|
//! | `WSOCK_CONFIG`          | Configuration file path        |
//! | `WSOCK_BIND`            | Listener address               |
//! | `WSOCK_PATH`            | Upgrade path                   |
//! | `WSOCK_GREETING`        | Greeting text                  |
//! | `WSOCK_MAX_PAYLOAD_LEN` | Largest accepted frame payload |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wsock::domain::ServerConfig;
use wsock::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket echo server for Hixie-76 and RFC 6455 clients.
#[derive(Debug, Parser)]
#[command(
    name = "wsock-echo",
    about = "WebSocket echo server speaking Hixie-76 and RFC 6455",
    version
)]
struct Cli {
    /// TOML configuration file.  Missing fields take their defaults.
    #[arg(long, env = "WSOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. `0.0.0.0:6969`.
    #[arg(long, env = "WSOCK_BIND")]
    bind: Option<SocketAddr>,

    /// The only path upgrades are accepted on.
    #[arg(long, env = "WSOCK_PATH")]
    path: Option<String>,

    /// Text sent to every client after the handshake; empty disables it.
    #[arg(long, env = "WSOCK_GREETING")]
    greeting: Option<String>,

    /// Largest frame payload accepted, in bytes.
    #[arg(long, env = "WSOCK_MAX_PAYLOAD_LEN")]
    max_payload_len: Option<usize>,
}

impl Cli {
    /// Loads the configuration file (if any) and applies CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(path) = self.path {
            config.path = path;
        }
        if let Some(greeting) = self.greeting {
            config.greeting = greeting;
        }
        if let Some(max) = self.max_payload_len {
            config.max_payload_len = max;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls the level; `info` when unset or invalid.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "wsock echo server starting: bind={}, path={}",
        config.bind_addr, config.path
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    // The accept loop checks `running` every 200 ms.
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("wsock echo server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
