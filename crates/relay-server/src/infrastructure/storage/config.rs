//! TOML configuration file for the relay.
//!
//! Every field is optional; a missing file section or key falls back to the
//! built-in default, so an empty file is a valid configuration.
//!
//! ```toml
//! [server]
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! device_port = 5000
//! admin_port = 5001
//! device_tls_port = 5040
//! admin_tls_port = 5041
//!
//! [tls]
//! cert_path = "/etc/relay/relay.crt"
//! key_path = "/etc/relay/relay.key"
//!
//! [timeouts]
//! validation_ms = 5000
//! idle_ms = 120000
//! keepalive_secs = 5
//! ```
//!
//! Command-line flags and environment variables are layered on top of this
//! file in `main.rs`.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::device_handler::DeviceTimeouts;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    /// Only one of `cert_path` / `key_path` was given.
    #[error("TLS needs both cert_path and key_path (only {0} is set)")]
    IncompleteTls(&'static str),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSection {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listen addresses.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// IP address all four listeners bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    #[serde(default = "default_device_tls_port")]
    pub device_tls_port: u16,
    #[serde(default = "default_admin_tls_port")]
    pub admin_tls_port: u16,
}

/// Certificate and key for the secure listeners.  Both or neither.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TlsSection {
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// Connection timers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TimeoutSection {
    /// Window for a device to send its MAC address.
    #[serde(default = "default_validation_ms")]
    pub validation_ms: u64,
    /// Longest silence tolerated on any connection.
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,
    /// Idle time before the kernel sends TCP keep-alive probes.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_device_port() -> u16 {
    5000
}
fn default_admin_port() -> u16 {
    5001
}
fn default_device_tls_port() -> u16 {
    5040
}
fn default_admin_tls_port() -> u16 {
    5041
}
fn default_validation_ms() -> u64 {
    5_000
}
fn default_idle_ms() -> u64 {
    120_000
}
fn default_keepalive_secs() -> u64 {
    5
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            device_port: default_device_port(),
            admin_port: default_admin_port(),
            device_tls_port: default_device_tls_port(),
            admin_tls_port: default_admin_tls_port(),
        }
    }
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            validation_ms: default_validation_ms(),
            idle_ms: default_idle_ms(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

/// The four listen endpoints, resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenAddrs {
    pub device: SocketAddr,
    pub admin: SocketAddr,
    pub device_tls: SocketAddr,
    pub admin_tls: SocketAddr,
}

impl RelayConfig {
    /// Parses `bind_address` and pairs it with each port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if the address is not an IP.
    pub fn listen_addrs(&self) -> Result<ListenAddrs, ConfigError> {
        let ip: IpAddr = self
            .network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))?;
        Ok(ListenAddrs {
            device: SocketAddr::new(ip, self.network.device_port),
            admin: SocketAddr::new(ip, self.network.admin_port),
            device_tls: SocketAddr::new(ip, self.network.device_tls_port),
            admin_tls: SocketAddr::new(ip, self.network.admin_tls_port),
        })
    }

    /// Certificate and key paths, if TLS is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IncompleteTls`] when only one of the two is set.
    pub fn tls_paths(&self) -> Result<Option<(&Path, &Path)>, ConfigError> {
        match (&self.tls.cert_path, &self.tls.key_path) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::IncompleteTls("cert_path")),
            (None, Some(_)) => Err(ConfigError::IncompleteTls("key_path")),
        }
    }

    pub fn device_timeouts(&self) -> DeviceTimeouts {
        DeviceTimeouts {
            validation: Duration::from_millis(self.timeouts.validation_ms),
            idle: Duration::from_millis(self.timeouts.idle_ms),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.idle_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.timeouts.keepalive_secs)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads `RelayConfig` from `path`.
///
/// The file must exist; callers without a config path use
/// [`RelayConfig::default`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
