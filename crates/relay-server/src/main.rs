//! Gateway relay: entry point.
//!
//! Starts the four listeners (device/admin, plaintext/TLS) and runs until
//! Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>                TOML config file
//!   --bind <IP>                    Address all listeners bind to [default: 0.0.0.0]
//!   --device-port <PORT>           Plaintext device port [default: 5000]
//!   --admin-port <PORT>            Plaintext admin port [default: 5001]
//!   --device-tls-port <PORT>       TLS device port [default: 5040]
//!   --admin-tls-port <PORT>        TLS admin port [default: 5041]
//!   --tls-cert <PATH>              PEM certificate chain for the TLS ports
//!   --tls-key <PATH>               PEM private key for the TLS ports
//!   --validation-timeout-ms <MS>   Time a device has to send its MAC [default: 5000]
//!   --idle-timeout-ms <MS>         Longest silence on any connection [default: 120000]
//!   --log-level <LEVEL>            Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Where settings come from
//!
//! Highest priority first:
//!
//! 1. Command-line flag
//! 2. Environment variable (`RELAY_BIND`, `RELAY_DEVICE_PORT`, ...)
//! 3. The `--config` TOML file
//! 4. Built-in default
//!
//! The TLS ports only open when both `--tls-cert` and `--tls-key` (or their
//! config/env equivalents) are set.
//!
//! # Talking to it
//!
//! ```text
//! $ nc localhost 5001          # admin console
//! ls
//! [2024-05-01T10:00:00.000Z][SESS][1001][AABBCC010203] 0 days, 00:03:12 trace: NA	2.4.1	-- 10.0.0.7:50122
//! cmd 1001 reboot
//! [2024-05-01T10:00:04.120Z][ADMIN CMD][127.0.0.1:40112] cmd 1001 reboot
//! [2024-05-01T10:00:04.121Z][CMD][1001][AABBCC010203] sent: reboot
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_server::application::registry::SessionRegistry;
use relay_server::infrastructure::run_server;
use relay_server::infrastructure::storage::config::{load_config, RelayConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Dual-role TCP/TLS relay for BLE/IoT gateway devices.
///
/// Every option is optional.  Anything not given on the command line or in
/// the environment is taken from `--config`, then from the built-in default.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "TCP/TLS relay between gateway devices and admin consoles",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address all listeners bind to.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// Plaintext device port.
    #[arg(long, env = "RELAY_DEVICE_PORT")]
    device_port: Option<u16>,

    /// Plaintext admin port.
    #[arg(long, env = "RELAY_ADMIN_PORT")]
    admin_port: Option<u16>,

    /// TLS device port.
    #[arg(long, env = "RELAY_DEVICE_TLS_PORT")]
    device_tls_port: Option<u16>,

    /// TLS admin port.
    #[arg(long, env = "RELAY_ADMIN_TLS_PORT")]
    admin_tls_port: Option<u16>,

    /// PEM certificate chain for the TLS ports.
    #[arg(long, env = "RELAY_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// PEM private key for the TLS ports.
    #[arg(long, env = "RELAY_TLS_KEY")]
    tls_key: Option<PathBuf>,

    /// Milliseconds a device has to send its MAC address.
    #[arg(long, env = "RELAY_VALIDATION_TIMEOUT_MS")]
    validation_timeout_ms: Option<u64>,

    /// Milliseconds of silence before any connection is closed.
    #[arg(long, env = "RELAY_IDLE_TIMEOUT_MS")]
    idle_timeout_ms: Option<u64>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file (if any) and applies every flag that was given.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(self, config: &mut RelayConfig) {
        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(port) = self.device_port {
            config.network.device_port = port;
        }
        if let Some(port) = self.admin_port {
            config.network.admin_port = port;
        }
        if let Some(port) = self.device_tls_port {
            config.network.device_tls_port = port;
        }
        if let Some(port) = self.admin_tls_port {
            config.network.admin_tls_port = port;
        }
        if let Some(cert) = self.tls_cert {
            config.tls.cert_path = Some(cert);
        }
        if let Some(key) = self.tls_key {
            config.tls.key_path = Some(key);
        }
        if let Some(ms) = self.validation_timeout_ms {
            config.timeouts.validation_ms = ms;
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.timeouts.idle_ms = ms;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the config file.
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins over the
///    configured log level.
/// 3. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 4. [`run_server`] binds every listener and accepts connections until the
///    flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_relay_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!(
        "gateway relay starting: bind={}, device={}, admin={}",
        config.network.bind_address, config.network.device_port, config.network.admin_port
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    let registry = Arc::new(SessionRegistry::new());
    run_server(&config, registry, running)
        .await
        .context("relay failed to start")?;

    info!("gateway relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
