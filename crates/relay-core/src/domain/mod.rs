//! Domain layer: pure business-logic types for the relay.
//!
//! Nothing in this module performs I/O.  The server crate feeds it text lines
//! and reads back typed values.
//!
//! # Sub-modules
//!
//! - **`mac`** – Recognising and canonicalising link-layer addresses.
//! - **`telemetry`** – Pulling firmware versions, secondary MACs and trace
//!   codes out of device lines.
//! - **`session`** – The per-device [`session::Session`] record and its
//!   listing format.
//! - **`command`** – Parsing admin text lines into [`command::AdminCommand`].
//! - **`events`** – The tagged messages broadcast to admins.

pub mod command;
pub mod events;
pub mod mac;
pub mod session;
pub mod telemetry;
