//! line-relay
//!
//! Accepts TCP connections, dials a fixed target for each one and relays
//! bytes between the two.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──▶ net::TcpListener ──▶ server (accept loop, backoff)
//!                                        │ spawn per connection
//!                                        ▼
//!                                 RelayHandler ──dial──▶ target
//!                                        │
//!                                        ▼
//!                          transport: plain │ tcp framing │ http framing
//! ```
//!
//! Framing modes:
//! - `plain`: bytes pass through untouched
//! - `tcp`:   `extern ` added toward the target, stripped on the way back
//! - `http`:  `extern ` stripped toward the target, added on the way back

use clap::Parser;
use std::path::PathBuf;

use line_relay::config::loader::{load_config, ConfigError};
use line_relay::config::validation::validate_config;
use line_relay::config::RelayConfig;
use line_relay::lifecycle::shutdown_signal;
use line_relay::net::TcpListener;
use line_relay::observability::init_logging;
use line_relay::{FramingMode, RelayHandler, Server};

#[derive(Parser)]
#[command(name = "line-relay")]
#[command(about = "Bidirectional TCP relay with optional extern line framing", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to accept connections on (overrides listener.bind_address).
    #[arg(short, long)]
    listen: Option<String>,

    /// Address to relay to (overrides target.address).
    #[arg(short, long)]
    target: Option<String>,

    /// Transport: plain, tcp or http.
    #[arg(short, long)]
    mode: Option<FramingMode>,

    /// Log level or filter directive.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(target) = self.target {
            config.target.address = target;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    init_logging(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.target.address,
        mode = %config.mode,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let handler = RelayHandler::new(
        config.target.address.clone(),
        config.mode,
        config.target.connect_timeout(),
    )
    .with_max_message_len(config.framing.max_message_len);

    let server = Server::new()
        .with_listener(listener)
        .with_handler(handler)
        .with_options(config.server_options());

    tokio::select! {
        res = server.run() => res?,
        _ = shutdown_signal() => server.close()?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
