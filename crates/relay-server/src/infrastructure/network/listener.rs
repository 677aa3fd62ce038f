//! The accept loops for the four listen endpoints.
//!
//! | Endpoint       | Role   | Transport | Default port |
//! |----------------|--------|-----------|--------------|
//! | device-plain   | device | TCP       | 5000         |
//! | admin-plain    | admin  | TCP       | 5001         |
//! | device-secure  | device | TLS       | 5040         |
//! | admin-secure   | admin  | TLS       | 5041         |
//!
//! Every endpoint runs the same loop: accept, enable keep-alive, spawn a task
//! for the connection, repeat.  The secure endpoints run the TLS handshake
//! inside that task before handing the stream over, so a slow handshake
//! never delays the next accept.
//!
//! # Shutdown
//!
//! `accept()` is wrapped in a 200 ms timeout so each loop notices the shared
//! `running` flag going `false` without needing a wake-up connection.
//! Connections already accepted keep running until the runtime stops.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_core::{RelayEvent, Transport};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use super::stream::{configure_keepalive, serve_admin, serve_device};
use super::tls::{load_acceptor, TlsError};
use crate::application::device_handler::DeviceTimeouts;
use crate::application::registry::SessionRegistry;
use crate::infrastructure::storage::config::{ConfigError, RelayConfig};

/// How often an idle accept loop re-checks the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);
/// Longest a TLS client may take to finish its handshake.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for starting the listeners.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {role} listener on {addr}: {source}")]
    Bind {
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Which handler an endpoint feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Device,
    Admin,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Device => "device",
            Role::Admin => "admin",
        }
    }
}

/// Everything a connection task needs, shared by all listeners.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub registry: Arc<SessionRegistry>,
    pub device_timeouts: DeviceTimeouts,
    pub admin_idle: Duration,
    pub keepalive: Duration,
}

impl ServerContext {
    pub fn from_config(config: &RelayConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            device_timeouts: config.device_timeouts(),
            admin_idle: config.idle_timeout(),
            keepalive: config.keepalive(),
        }
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// A bound, not yet accepting, endpoint.
pub struct BoundListener {
    role: Role,
    tls: Option<TlsAcceptor>,
    listener: TcpListener,
}

impl BoundListener {
    /// Binds `addr` for `role`.  Pass an acceptor to make it a secure endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] if the address is unavailable.
    pub async fn bind(
        role: Role,
        addr: SocketAddr,
        tls: Option<TlsAcceptor>,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                role: role.name(),
                addr,
                source,
            })?;
        Ok(Self {
            role,
            tls,
            listener,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn transport(&self) -> Transport {
        if self.tls.is_some() {
            Transport::Tls
        } else {
            Transport::Plain
        }
    }

    /// Accepts connections until `running` is cleared.
    pub async fn run(self, ctx: ServerContext, running: Arc<AtomicBool>) {
        let transport = self.transport();
        match self.local_addr() {
            Ok(addr) => {
                info!("{} listener ({transport}) on {addr}", self.role.name());
                ctx.registry
                    .broadcast(RelayEvent::ServerStarted {
                        role: self.role.name(),
                        addr,
                        transport,
                    })
                    .await;
            }
            Err(e) => warn!("{} listener has no local address: {e}", self.role.name()),
        }

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping {} accept loop", self.role.name());
                break;
            }

            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    debug!("{} connection from {peer}", self.role.name());
                    let ctx = ctx.clone();
                    let tls = self.tls.clone();
                    let role = self.role;
                    tokio::spawn(async move {
                        handle_connection(stream, peer, role, tls, ctx).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep accepting.
                    error!("{} accept error: {e}", self.role.name());
                }
                Err(_) => {
                    // No connection within the poll window.
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    role: Role,
    tls: Option<TlsAcceptor>,
    ctx: ServerContext,
) {
    if let Err(e) = configure_keepalive(&stream, ctx.keepalive) {
        debug!("keep-alive setup for {peer} failed: {e}");
    }

    let Some(acceptor) = tls else {
        dispatch(stream, peer, role, Transport::Plain, ctx).await;
        return;
    };

    match timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => dispatch(tls_stream, peer, role, Transport::Tls, ctx).await,
        Ok(Err(e)) => warn!("TLS handshake with {peer} failed: {e}"),
        Err(_) => warn!("TLS handshake with {peer} timed out"),
    }
}

async fn dispatch<S>(stream: S, peer: SocketAddr, role: Role, transport: Transport, ctx: ServerContext)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    match role {
        Role::Device => {
            serve_device(stream, peer, transport, ctx.registry, ctx.device_timeouts).await
        }
        Role::Admin => serve_admin(stream, peer, transport, ctx.registry, ctx.admin_idle).await,
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// Binds every configured endpoint, then runs them until `running` clears.
///
/// All binds happen before any loop starts, so a port conflict fails startup
/// instead of leaving a half-running relay.
///
/// # Errors
///
/// Invalid bind address, incomplete or unreadable TLS material, or a bind
/// failure on any endpoint.
pub async fn run_server(
    config: &RelayConfig,
    registry: Arc<SessionRegistry>,
    running: Arc<AtomicBool>,
) -> Result<(), ListenerError> {
    let addrs = config.listen_addrs()?;
    let acceptor = match config.tls_paths()? {
        Some((cert, key)) => Some(load_acceptor(cert, key)?),
        None => {
            warn!("no TLS certificate configured; secure listeners disabled");
            None
        }
    };

    let mut listeners = vec![
        BoundListener::bind(Role::Device, addrs.device, None).await?,
        BoundListener::bind(Role::Admin, addrs.admin, None).await?,
    ];
    if let Some(acceptor) = acceptor {
        listeners.push(BoundListener::bind(Role::Device, addrs.device_tls, Some(acceptor.clone())).await?);
        listeners.push(BoundListener::bind(Role::Admin, addrs.admin_tls, Some(acceptor)).await?);
    }

    let ctx = ServerContext::from_config(config, registry);
    let tasks: Vec<_> = listeners
        .into_iter()
        .map(|listener| tokio::spawn(listener.run(ctx.clone(), Arc::clone(&running))))
        .collect();

    for task in tasks {
        if let Err(e) = task.await {
            error!("listener task failed: {e}");
        }
    }
    info!("all listeners stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::link::ConnectionHandle;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn test_context(registry: Arc<SessionRegistry>) -> ServerContext {
        ServerContext {
            registry,
            device_timeouts: DeviceTimeouts::default(),
            admin_idle: Duration::from_secs(60),
            keepalive: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_role_names() {
        assert_eq!(Role::Device.name(), "device");
        assert_eq!(Role::Admin.name(), "admin");
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported_with_role_and_addr() {
        // Arrange: hold a port
        let first = BoundListener::bind(Role::Device, loopback(), None)
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        // Act
        let err = BoundListener::bind(Role::Admin, taken, None)
            .await
            .err()
            .unwrap();

        // Assert
        let msg = err.to_string();
        assert!(msg.contains("admin"));
        assert!(msg.contains(&taken.to_string()));
    }

    #[tokio::test]
    async fn test_run_announces_start_and_stops_on_flag() {
        // Arrange
        let registry = Arc::new(SessionRegistry::new());
        let (admin, mut admin_rx) = ConnectionHandle::new();
        registry
            .register_admin(loopback(), Transport::Plain, admin)
            .await;
        let listener = BoundListener::bind(Role::Device, loopback(), None)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));

        // Act
        let task = tokio::spawn(listener.run(test_context(Arc::clone(&registry)), Arc::clone(&running)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        running.store(false, Ordering::Relaxed);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

        // Assert
        let start = admin_rx.try_recv().unwrap();
        assert!(start.contains("[START] device listener (tcp)"));
        assert!(start.contains(&addr.to_string()));
    }

    #[tokio::test]
    async fn test_run_server_rejects_half_configured_tls() {
        // Arrange
        let mut config = RelayConfig::default();
        config.network.bind_address = "127.0.0.1".to_string();
        config.tls.key_path = Some("relay.key".into());

        // Act
        let err = run_server(
            &config,
            Arc::new(SessionRegistry::new()),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap_err();

        // Assert
        assert!(matches!(err, ListenerError::Config(ConfigError::IncompleteTls(_))));
    }

    #[tokio::test]
    async fn test_run_server_rejects_missing_tls_files() {
        let mut config = RelayConfig::default();
        config.network.bind_address = "127.0.0.1".to_string();
        config.tls.cert_path = Some("/definitely/not/here/relay.crt".into());
        config.tls.key_path = Some("/definitely/not/here/relay.key".into());

        let err = run_server(
            &config,
            Arc::new(SessionRegistry::new()),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ListenerError::Tls(TlsError::Io { .. })));
    }
}
