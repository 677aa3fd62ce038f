//! Admin connection handler.
//!
//! An admin connection is simpler than a device connection: no
//! identification step, just a loop that reads command lines until the peer
//! leaves or goes idle.  Each non-empty line is echoed to every admin as an
//! `[ADMIN CMD]` audit line and then executed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{AdminCommand, RelayEvent, Transport};
use tokio::time::timeout;
use tracing::debug;

use super::admin_commands;
use super::link::{ConnectionHandle, LineSource};
use super::registry::SessionRegistry;

/// Sent before closing an admin that went silent.
pub const ADMIN_IDLE_REPLY: &str = "Idle timeout, closing admin connection";

/// Why an admin session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCloseCause {
    CloseRequested,
    IdleTimeout,
    PeerEnded,
    ReadError,
}

/// Runs one admin connection to completion.
pub async fn run_admin_session<L: LineSource>(
    registry: Arc<SessionRegistry>,
    link: ConnectionHandle,
    lines: &mut L,
    remote: SocketAddr,
    transport: Transport,
    idle: Duration,
) -> AdminCloseCause {
    let admin = registry
        .register_admin(remote, transport, link.clone())
        .await;
    registry
        .broadcast(RelayEvent::AdminConnected { remote, transport })
        .await;

    let close_requested = link.closed();
    tokio::pin!(close_requested);

    let cause = loop {
        tokio::select! {
            biased;

            _ = &mut close_requested => break AdminCloseCause::CloseRequested,

            read = timeout(idle, lines.next_line()) => match read {
                Err(_elapsed) => {
                    registry.broadcast(RelayEvent::AdminTimeout { remote }).await;
                    if let Err(e) = link.send_line(ADMIN_IDLE_REPLY) {
                        debug!("idle notice to admin {remote} dropped: {e}");
                    }
                    break AdminCloseCause::IdleTimeout;
                }
                Ok(Ok(Some(line))) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    registry
                        .broadcast(RelayEvent::AdminCommandReceived {
                            remote,
                            line: line.to_string(),
                        })
                        .await;
                    admin_commands::execute(&AdminCommand::parse(line), &registry).await;
                }
                Ok(Ok(None)) => break AdminCloseCause::PeerEnded,
                Ok(Err(e)) => {
                    debug!("admin {remote} read failed: {e}");
                    break AdminCloseCause::ReadError;
                }
            },
        }
    };

    // Out of the broadcast set before [ADMIN CLOSE] goes out.
    registry.unregister_admin(admin.id).await;
    link.close();
    registry.broadcast(RelayEvent::AdminClosed { remote }).await;
    debug!("admin session {remote} ended: {cause:?}");
    cause
}

// ── Tests ─────────────────────────────────────────────────────────────────────
