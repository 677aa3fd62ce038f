//! Operator-facing event vocabulary.
//!
//! Every state transition the relay goes through is rendered as one tagged
//! line and broadcast to all admins.  The tag text is a log contract for
//! humans, not a machine API, but it is stable enough to grep for:
//!
//! | Tag            | Meaning                                          |
//! |----------------|--------------------------------------------------|
//! | `[START]`      | A listener is accepting connections              |
//! | `[CONN]`       | A device connected                               |
//! | `[DATA]`       | A line received from a device (audit echo)       |
//! | `[IDENT]`      | A device reported its MAC address                |
//! | `[NOT VALID]`  | A device failed to identify in time              |
//! | `[TIMEOUT]`    | A device was idle for too long                   |
//! | `[END]`        | A device closed its side of the connection       |
//! | `[ERROR]`      | A device transport error                         |
//! | `[CLOSE]`      | A device session was torn down                   |
//! | `[ADMIN CONN]` | An admin connected                               |
//! | `[ADMIN CLOSE]`| An admin disconnected                            |
//! | `[ADMIN TIMEOUT]` | An admin was idle for too long                |
//! | `[ADMIN CMD]`  | An admin line was received                       |
//! | `[CMD]`        | A payload was written to a device                |
//! | `[CMD ERR]`    | A command target could not be served             |
//! | `[DROP]`       | An admin dropped a session                       |
//! | `[SESS]`       | One `ls` result line                             |

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use super::session::{SessionId, Transport};

/// A single broadcastable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    ServerStarted {
        role: &'static str,
        addr: SocketAddr,
        transport: Transport,
    },
    DeviceConnected {
        id: SessionId,
        remote: SocketAddr,
        transport: Transport,
    },
    DeviceLine {
        id: SessionId,
        token: String,
        line: String,
    },
    DeviceIdentified {
        id: SessionId,
        token: String,
        mac: String,
    },
    NotValid {
        id: SessionId,
        remote: SocketAddr,
        after: Duration,
    },
    IdleTimeout {
        id: SessionId,
        token: String,
        after: Duration,
    },
    PeerEnded {
        id: SessionId,
        token: String,
    },
    DeviceError {
        id: SessionId,
        token: String,
        error: String,
    },
    DeviceClosed {
        id: SessionId,
        token: String,
        remote: SocketAddr,
    },
    AdminConnected {
        remote: SocketAddr,
        transport: Transport,
    },
    AdminClosed {
        remote: SocketAddr,
    },
    AdminTimeout {
        remote: SocketAddr,
    },
    AdminCommandReceived {
        remote: SocketAddr,
        line: String,
    },
    CommandSent {
        id: SessionId,
        token: String,
        payload: String,
    },
    CommandNotFound {
        target: String,
    },
    CommandNotWritable {
        id: SessionId,
        token: String,
    },
    CommandInvalidTarget {
        target: String,
    },
    Dropped {
        id: SessionId,
        token: String,
    },
    /// A pre-formatted `ls` line.
    Listing(String),
}

impl fmt::Display for RelayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEvent::ServerStarted {
                role,
                addr,
                transport,
            } => write!(f, "[START] {role} listener ({transport}) on {addr}"),
            RelayEvent::DeviceConnected {
                id,
                remote,
                transport,
            } => write!(f, "[CONN][{id}] device connected from {remote} ({transport})"),
            RelayEvent::DeviceLine { id, token, line } => {
                write!(f, "[DATA][{id}][{token}] {line}")
            }
            RelayEvent::DeviceIdentified { id, token, mac } => {
                write!(f, "[IDENT][{id}][{token}] identified as {mac}")
            }
            RelayEvent::NotValid { id, remote, after } => write!(
                f,
                "[NOT VALID][{id}] no identification from {remote} within {} ms",
                after.as_millis()
            ),
            RelayEvent::IdleTimeout { id, token, after } => write!(
                f,
                "[TIMEOUT][{id}][{token}] idle for {} ms",
                after.as_millis()
            ),
            RelayEvent::PeerEnded { id, token } => {
                write!(f, "[END][{id}][{token}] device ended the connection")
            }
            RelayEvent::DeviceError { id, token, error } => {
                write!(f, "[ERROR][{id}][{token}] {error}")
            }
            RelayEvent::DeviceClosed { id, token, remote } => {
                write!(f, "[CLOSE][{id}][{token}] connection from {remote} closed")
            }
            RelayEvent::AdminConnected { remote, transport } => {
                write!(f, "[ADMIN CONN] admin connected from {remote} ({transport})")
            }
            RelayEvent::AdminClosed { remote } => {
                write!(f, "[ADMIN CLOSE] admin {remote} disconnected")
            }
            RelayEvent::AdminTimeout { remote } => {
                write!(f, "[ADMIN TIMEOUT] admin {remote} idle timeout")
            }
            RelayEvent::AdminCommandReceived { remote, line } => {
                write!(f, "[ADMIN CMD][{remote}] {line}")
            }
            RelayEvent::CommandSent { id, token, payload } => {
                write!(f, "[CMD][{id}][{token}] sent: {payload}")
            }
            RelayEvent::CommandNotFound { target } => {
                write!(f, "[CMD ERR] target not found: {target}")
            }
            RelayEvent::CommandNotWritable { id, token } => {
                write!(f, "[CMD ERR][{id}][{token}] connection not writable")
            }
            RelayEvent::CommandInvalidTarget { target } => {
                write!(f, "[CMD ERR] invalid target format (not a number or MAC): {target}")
            }
            RelayEvent::Dropped { id, token } => {
                write!(f, "[DROP][{id}][{token}] dropping session")
            }
            RelayEvent::Listing(line) => f.write_str(line),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
