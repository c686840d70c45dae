//! Connection and server configuration.
//!
//! [`ConnectionConfig`] carries the per-connection limits every handshake
//! function takes.  [`ServerConfig`] is the demo echo server's full settings;
//! it can be built from defaults, loaded from a TOML file, and then
//! overridden by CLI flags in `main.rs`.
//!
//! # TOML layout
//!
//! ```toml
//! bind_addr = "127.0.0.1:6969"
//! path = "/ws"
//! greeting = "Hello from wsock"
//! max_payload_len = 1048576
//! read_buffer_size = 4096
//! ```
//!
//! Every field is optional; a missing field takes its default, so an empty
//! file is a valid configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wsock_core::protocol::DEFAULT_MAX_PAYLOAD_LEN;

/// Default size of each read from the underlying stream.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Connection ────────────────────────────────────────────────────────────────

/// Limits applied to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Largest frame payload (v13) or pending text (v0) accepted from the peer.
    pub max_payload_len: usize,
    /// Bytes requested from the stream per read.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// Settings for the `wsock-echo` server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.  The v13 `Host` check and the v0
    /// `Sec-WebSocket-Location` use the local address each connection was
    /// accepted on instead, which differs when bound to `0.0.0.0`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// The only path upgrades are accepted on; anything else gets a 404.
    #[serde(default = "default_path")]
    pub path: String,
    /// Text sent to every client right after the handshake.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6969))
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_greeting() -> String {
    "Hello from wsock".to_string()
}

fn default_max_payload_len() -> usize {
    DEFAULT_MAX_PAYLOAD_LEN
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl Default for ServerConfig {
    /// | Field            | Default              |
    /// |------------------|----------------------|
    /// | bind_addr        | `127.0.0.1:6969`     |
    /// | path             | `/ws`                |
    /// | greeting         | `Hello from wsock`   |
    /// | max_payload_len  | 64 MiB               |
    /// | read_buffer_size | 4096                 |
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            path: default_path(),
            greeting: default_greeting(),
            max_payload_len: default_max_payload_len(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its content is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The per-connection limits derived from this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_payload_len: self.max_payload_len,
            read_buffer_size: self.read_buffer_size,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_connection_limits() {
        let cfg = ConnectionConfig::default();
        assert_eq!(cfg.max_payload_len, 64 * 1024 * 1024);
        assert_eq!(cfg.read_buffer_size, 4096);
    }

    #[test]
    fn test_default_server_binds_loopback_6969() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:6969");
        assert_eq!(cfg.path, "/ws");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        // Arrange / Act
        let cfg = ServerConfig::from_toml_str("").unwrap();

        // Assert
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            greeting = "hi"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.greeting, "hi");
        assert_eq!(cfg.path, "/ws");
        assert_eq!(cfg.max_payload_len, DEFAULT_MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = ServerConfig::from_toml_str("bind_addr = 12");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ServerConfig::load(Path::new("/nonexistent/wsock/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_connection_config_mirrors_server_limits() {
        let cfg = ServerConfig {
            max_payload_len: 10,
            read_buffer_size: 20,
            ..ServerConfig::default()
        };
        assert_eq!(
            cfg.connection_config(),
            ConnectionConfig {
                max_payload_len: 10,
                read_buffer_size: 20
            }
        );
    }
}
