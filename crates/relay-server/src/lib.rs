//! relay-server library crate.
//!
//! A dual-role TCP/TLS relay.  Devices (BLE/IoT gateways) connect on one pair
//! of ports, announce their MAC address and stream telemetry lines.  Admins
//! connect on another pair, list the devices that are online and send them
//! commands.  Every state change is broadcast to every admin as a
//! timestamped log line.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Devices (text lines)            Admins (text lines)
//!         ↕                               ↕
//! [relay-server]
//!   ├── application/
//!   │     ├── registry         SessionRegistry + broadcast
//!   │     ├── device_handler   identify / validate / idle state machine
//!   │     ├── admin_handler    audit + dispatch admin lines
//!   │     └── admin_commands   ls / cmd / cmdall / drop
//!   └── infrastructure/
//!         ├── network/         listeners, TLS, socket adapter
//!         └── storage/         TOML config
//! ```
//!
//! # Layer rules
//!
//! - `application` depends on `relay-core` and tokio's sync/time primitives
//!   only; it never sees a socket.
//! - `infrastructure` depends on all other layers plus `tokio::net`,
//!   `rustls` and `socket2`.

/// Application layer: registry, connection state machines, commands.
pub mod application;

/// Infrastructure layer: sockets, TLS, configuration file.
pub mod infrastructure;
