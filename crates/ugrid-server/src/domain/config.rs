//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It can be read from a TOML file, built from CLI arguments, or taken from
//! defaults (useful for local development and tests).
//!
//! # File format
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 12346
//! ws_port = 12347
//! write_timeout_secs = 30
//! statistics = true
//! ```
//!
//! Every key is optional; missing keys take the defaults listed on
//! [`ServerConfig::default`].  Unknown keys are rejected so a typo does not
//! silently fall back to a default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ugrid_core::protocol::codec::DEFAULT_MAX_PAYLOAD_LEN;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed correctly but is not usable.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// All runtime configuration for the broker.
///
/// Build this once at startup and share it (it is `Clone`) with the
/// listeners and the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface both listeners bind to.
    pub bind: IpAddr,

    /// TCP port of the stream-socket listener.
    pub port: u16,

    /// TCP port of the WebSocket listener; `None` disables it.
    pub ws_port: Option<u16>,

    /// Deadline for a single write to a recipient, in seconds.
    ///
    /// A write that does not complete in time is treated as "recipient not
    /// live" and routing continues.  `0` disables the deadline, in which case
    /// a stuck recipient stalls the sending connection indefinitely.
    pub write_timeout_secs: u64,

    /// Number of frames that may be queued for one connection's writer.
    pub outbox_capacity: usize,

    /// Largest accepted frame payload, in bytes.
    pub max_frame_len: usize,

    /// Log the message rate periodically.
    pub statistics: bool,

    /// Interval between statistics log lines, in seconds.
    pub stats_interval_secs: u64,
}

impl Default for ServerConfig {
    /// | Field               | Default     |
    /// |---------------------|-------------|
    /// | bind                | `0.0.0.0`   |
    /// | port                | `12346`     |
    /// | ws_port             | none        |
    /// | write_timeout_secs  | `30`        |
    /// | outbox_capacity     | `64`        |
    /// | max_frame_len       | 16 MiB      |
    /// | statistics          | `false`     |
    /// | stats_interval_secs | `10`        |
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 12346,
            ws_port: None,
            write_timeout_secs: 30,
            outbox_capacity: 64,
            max_frame_len: DEFAULT_MAX_PAYLOAD_LEN,
            statistics: false,
            stats_interval_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`ServerConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "outbox_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::Invalid {
                field: "max_frame_len",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.ws_port.is_some_and(|ws| ws == self.port) {
            return Err(ConfigError::Invalid {
                field: "ws_port",
                reason: format!("must differ from the TCP port {}", self.port),
            });
        }
        if self.statistics && self.stats_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "stats_interval_secs",
                reason: "must be at least 1 when statistics are enabled".to_string(),
            });
        }
        Ok(())
    }

    /// Address of the TCP listener.
    pub fn tcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Address of the WebSocket listener, if enabled.
    pub fn ws_addr(&self) -> Option<SocketAddr> {
        self.ws_port.map(|port| SocketAddr::new(self.bind, port))
    }

    /// Per-write deadline, `None` when disabled.
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_secs > 0).then(|| Duration::from_secs(self.write_timeout_secs))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
