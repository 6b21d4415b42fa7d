//! ugrid message broker — entry point.
//!
//! Accepts TCP (and optionally WebSocket) connections and routes binary
//! frames between them: to one connection (unicast), to every subscriber of
//! a topic (multicast), or to the server's command dispatcher.
//!
//! # Usage
//!
//! ```text
//! ugrid-server [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>         TOML configuration file
//!   -p, --port <PORT>           TCP listener port [default: 12346]
//!   -w, --wsport <PORT>         WebSocket listener port [default: disabled]
//!       --bind <IP>             Interface to bind [default: 0.0.0.0]
//!   -s, --statistics            Log the message rate periodically
//!       --write-timeout <SECS>  Per-recipient write deadline, 0 = none [default: 30]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable               | Option            |
//! |------------------------|-------------------|
//! | `UGRID_CONFIG`         | `--config`        |
//! | `UGRID_PORT`           | `--port`          |
//! | `UGRID_WSPORT`         | `--wsport`        |
//! | `UGRID_BIND`           | `--bind`          |
//! | `UGRID_STATISTICS`     | `--statistics`    |
//! | `UGRID_WRITE_TIMEOUT`  | `--write-timeout` |
//!
//! Precedence: command line, then environment, then config file, then
//! built-in defaults.  Log verbosity follows `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ugrid_server::application::Broker;
use ugrid_server::domain::ServerConfig;
use ugrid_server::infrastructure::{run_stats_reporter, Listener, ListenerKind};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ugrid message broker.
///
/// Options left unset fall back to the config file (if given) and then to
/// the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "ugrid-server",
    about = "Connection-oriented message broker with unicast, multicast and server commands",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "UGRID_CONFIG")]
    config: Option<PathBuf>,

    /// TCP listener port.
    #[arg(short, long, env = "UGRID_PORT")]
    port: Option<u16>,

    /// WebSocket listener port; the WebSocket listener is off unless set.
    #[arg(short, long = "wsport", env = "UGRID_WSPORT")]
    wsport: Option<u16>,

    /// IP address both listeners bind to.
    #[arg(long, env = "UGRID_BIND")]
    bind: Option<IpAddr>,

    /// Log the message rate periodically.
    #[arg(short, long, env = "UGRID_STATISTICS")]
    statistics: bool,

    /// Per-recipient write deadline in seconds (`0` disables it).
    #[arg(long, env = "UGRID_WRITE_TIMEOUT")]
    write_timeout: Option<u64>,
}

impl Cli {
    /// Builds the effective [`ServerConfig`]: file (or defaults) with the
    /// command-line values applied on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the merged
    /// configuration is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ws_port) = self.wsport {
            config.ws_port = Some(ws_port);
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if self.statistics {
            config.statistics = true;
        }
        if let Some(secs) = self.write_timeout {
            config.write_timeout_secs = secs;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Initialise `tracing` (level from `RUST_LOG`, default `info`).
/// 2. Parse the CLI and build the [`ServerConfig`].
/// 3. Create the shared [`Broker`].
/// 4. Bind the TCP listener and, if configured, the WebSocket listener.
/// 5. Install the Ctrl+C handler that clears the `running` flag.
/// 6. Serve until every listener has stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;
    info!(
        "ugrid broker starting: tcp={}, websocket={}, write timeout={:?}",
        config.tcp_addr(),
        config
            .ws_addr()
            .map_or_else(|| "disabled".to_string(), |a| a.to_string()),
        config.write_timeout(),
    );

    let broker = Arc::new(Broker::new(&config));
    let running = Arc::new(AtomicBool::new(true));

    // Bind everything before serving so a port conflict fails startup.
    let mut listeners = vec![Listener::bind(ListenerKind::Tcp, config.tcp_addr()).await?];
    if let Some(ws_addr) = config.ws_addr() {
        listeners.push(Listener::bind(ListenerKind::WebSocket, ws_addr).await?);
    }

    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    if config.statistics {
        tokio::spawn(run_stats_reporter(
            Arc::clone(&broker),
            config.stats_interval(),
            Arc::clone(&running),
        ));
    }

    let tasks: Vec<_> = listeners
        .into_iter()
        .map(|listener| tokio::spawn(listener.serve(Arc::clone(&broker), Arc::clone(&running))))
        .collect();
    for task in tasks {
        task.await.context("listener task panicked")??;
    }

    info!("ugrid broker stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_arguments_yields_default_config() {
        let cli = Cli::parse_from(["ugrid-server"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_short_flags_override_defaults() {
        // Arrange
        let cli = Cli::parse_from(["ugrid-server", "-p", "4000", "-w", "4001", "-s"]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.port, 4000);
        assert_eq!(config.ws_port, Some(4001));
        assert!(config.statistics);
    }

    #[test]
    fn test_write_timeout_zero_disables_deadline() {
        let cli = Cli::parse_from(["ugrid-server", "--write-timeout", "0"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.write_timeout(), None);
    }

    #[test]
    fn test_bind_accepts_ipv6() {
        let cli = Cli::parse_from(["ugrid-server", "--bind", "::1"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.tcp_addr().to_string(), "[::1]:12346");
    }

    #[test]
    fn test_same_tcp_and_ws_port_is_rejected() {
        let cli = Cli::parse_from(["ugrid-server", "-p", "5000", "-w", "5000"]);
        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let cli = Cli::parse_from(["ugrid-server", "--config", "/no/such/ugrid.toml"]);
        let err = cli.into_server_config().unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/ugrid.toml"));
    }
}
