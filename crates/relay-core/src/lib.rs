//! # relay-core
//!
//! Shared library for the gateway relay containing the device session model,
//! MAC address and telemetry extraction, the admin command grammar, and the
//! newline framing used on every connection.
//!
//! This crate has zero dependencies on sockets, timers, or async runtimes.
//! Everything here is a pure function of its inputs, which is what lets the
//! server crate test its state machines without opening a port.
//!
//! # Architecture overview (for beginners)
//!
//! The relay sits between two kinds of peers:
//!
//! - **Devices** (BLE/IoT gateways) connect, announce their MAC address and
//!   report telemetry as free-form text lines.
//! - **Admins** (humans or tools) connect to a separate port, list the devices
//!   that are online and send commands to them.
//!
//! This crate defines the vocabulary both sides share:
//!
//! - **`domain`** – The [`Session`] record, MAC parsing, telemetry patterns,
//!   the [`AdminCommand`] grammar, and the [`RelayEvent`] log vocabulary.
//!
//! - **`protocol`** – How bytes become lines ([`LineBuffer`]) and how events
//!   become timestamped operator log lines ([`format_log_line`]).

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::Session` instead of `relay_core::domain::session::Session`.
pub use domain::command::{parse_session_id, AdminCommand, Target};
pub use domain::events::RelayEvent;
pub use domain::mac::{find_mac, is_mac, MacAddress, MacParseError};
pub use domain::session::{
    format_uptime, Session, SessionId, SessionStatus, Transport, FIRST_SESSION_ID, SENTINEL,
};
pub use domain::telemetry::{extract_telemetry, TelemetryField};
pub use protocol::line_buffer::{LineBuffer, MAX_LINE_LEN};
pub use protocol::log_line::{format_log_line, format_log_line_at};
