//! Device connection state machine.
//!
//! One call to [`run_device_session`] drives one device connection from
//! accept to teardown:
//!
//! ```text
//!   Accepted ──► Identifying ──(MAC seen)──► Identified
//!                    │                           │
//!                    └──────────► Closed ◄───────┘
//! ```
//!
//! Four things can end a session, and they race inside a single
//! `tokio::select!`:
//!
//! | Cause                         | Device sees           | Broadcast      |
//! |-------------------------------|-----------------------|----------------|
//! | close requested (`drop`)      | nothing               | (`[DROP]` by the admin side) |
//! | no MAC within the validation window | [`NOT_VALID_REPLY`] | `[NOT VALID]` |
//! | no line within the idle window | [`IDLE_TIMEOUT_REPLY`] | `[TIMEOUT]`  |
//! | peer EOF / read error         | nothing               | `[END]` / `[ERROR]` |
//!
//! Whatever the cause, the loop exits and the teardown after it runs exactly
//! once: close the link, mark the session closed, broadcast `[CLOSE]`, and
//! remove the session from the registry.
//!
//! Timers are plain futures owned by this function.  Leaving the loop drops
//! them, which is all the cancellation they need; a timer can never fire
//! against a session that has already been torn down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{
    extract_telemetry, find_mac, MacAddress, RelayEvent, SessionId, SessionStatus, Transport,
};
use tokio::time::{sleep, timeout};
use tracing::debug;

use super::link::{ConnectionHandle, LineSource};
use super::registry::SessionRegistry;

/// First reply line after a device identifies itself.
pub const SYS_REPLY: &str = "SYS ";
/// Second reply line after a device identifies itself.
pub const SYS_DBG_REPLY: &str = "SYS DBG ";
/// Sent before closing a device that never identified.
pub const NOT_VALID_REPLY: &str = "Not a valid device, closing connection";
/// Sent before closing a connection that went silent.
pub const IDLE_TIMEOUT_REPLY: &str = "Idle timeout, closing connection";

/// Default window for a device to send its MAC.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Default window between two inbound lines.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Timer settings for device connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTimeouts {
    pub validation: Duration,
    pub idle: Duration,
}

impl Default for DeviceTimeouts {
    fn default() -> Self {
        Self {
            validation: DEFAULT_VALIDATION_TIMEOUT,
            idle: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Why a device session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// Someone called [`ConnectionHandle::close`] (an admin `drop`, or the
    /// writer task after a failed write).
    CloseRequested,
    NotValid,
    IdleTimeout,
    PeerEnded,
    ReadError,
}

/// Per-connection state the loop carries between lines.
struct DeviceState {
    id: SessionId,
    token: String,
    identified: bool,
}

/// Runs one device connection to completion.
///
/// `link` must be the handle whose outbound queue feeds this connection's
/// writer.  Returns once the session has been removed from `registry`.
pub async fn run_device_session<L: LineSource>(
    registry: Arc<SessionRegistry>,
    link: ConnectionHandle,
    lines: &mut L,
    remote: SocketAddr,
    transport: Transport,
    timeouts: DeviceTimeouts,
) -> CloseCause {
    let session = registry
        .create_session(remote, transport, link.clone())
        .await;
    let mut state = DeviceState {
        id: session.id,
        token: session.token,
        identified: false,
    };
    registry
        .broadcast(RelayEvent::DeviceConnected {
            id: state.id,
            remote,
            transport,
        })
        .await;

    let validation = sleep(timeouts.validation);
    tokio::pin!(validation);
    let close_requested = link.closed();
    tokio::pin!(close_requested);

    let cause = loop {
        tokio::select! {
            biased;

            _ = &mut close_requested => break CloseCause::CloseRequested,

            _ = &mut validation, if !state.identified => {
                registry
                    .broadcast(RelayEvent::NotValid {
                        id: state.id,
                        remote,
                        after: timeouts.validation,
                    })
                    .await;
                reply(&link, state.id, NOT_VALID_REPLY);
                break CloseCause::NotValid;
            }

            read = timeout(timeouts.idle, lines.next_line()) => match read {
                Err(_elapsed) => {
                    registry
                        .broadcast(RelayEvent::IdleTimeout {
                            id: state.id,
                            token: state.token.clone(),
                            after: timeouts.idle,
                        })
                        .await;
                    reply(&link, state.id, IDLE_TIMEOUT_REPLY);
                    break CloseCause::IdleTimeout;
                }
                Ok(Ok(Some(line))) => handle_line(&registry, &link, &mut state, line).await,
                Ok(Ok(None)) => {
                    registry
                        .broadcast(RelayEvent::PeerEnded {
                            id: state.id,
                            token: state.token.clone(),
                        })
                        .await;
                    break CloseCause::PeerEnded;
                }
                Ok(Err(e)) => {
                    registry
                        .broadcast(RelayEvent::DeviceError {
                            id: state.id,
                            token: state.token.clone(),
                            error: e.to_string(),
                        })
                        .await;
                    break CloseCause::ReadError;
                }
            },
        }
    };

    // ── Teardown (runs once) ──────────────────────────────────────────────────
    link.close();
    registry
        .update_session(state.id, |session| session.status = SessionStatus::Closed)
        .await;
    registry
        .broadcast(RelayEvent::DeviceClosed {
            id: state.id,
            token: state.token,
            remote,
        })
        .await;
    registry.remove_session(state.id).await;
    debug!("device session {} ended: {cause:?}", state.id);
    cause
}

/// Audits one inbound line, then applies any MAC or telemetry it carries.
async fn handle_line(
    registry: &SessionRegistry,
    link: &ConnectionHandle,
    state: &mut DeviceState,
    line: String,
) {
    let mac = if state.identified {
        None
    } else {
        find_mac(&line)
    };
    let fields = extract_telemetry(&line);

    registry
        .broadcast(RelayEvent::DeviceLine {
            id: state.id,
            token: state.token.clone(),
            line,
        })
        .await;

    let newly_identified = registry
        .update_session(state.id, |session| {
            for field in &fields {
                session.apply_telemetry(field);
            }
            mac.is_some_and(|mac| session.identify(mac))
        })
        .await
        .unwrap_or(false);

    if let (true, Some(mac)) = (newly_identified, mac) {
        on_identified(registry, link, state, mac).await;
    }
}

async fn on_identified(
    registry: &SessionRegistry,
    link: &ConnectionHandle,
    state: &mut DeviceState,
    mac: MacAddress,
) {
    state.identified = true;
    state.token = mac.token();
    reply(link, state.id, SYS_REPLY);
    reply(link, state.id, SYS_DBG_REPLY);
    registry
        .broadcast(RelayEvent::DeviceIdentified {
            id: state.id,
            token: state.token.clone(),
            mac: mac.to_string(),
        })
        .await;
}

/// Queues a line for the device; a closed link is not an error here.
fn reply(link: &ConnectionHandle, id: SessionId, line: &str) {
    if let Err(e) = link.send_line(line) {
        debug!("reply to session {id} dropped: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
