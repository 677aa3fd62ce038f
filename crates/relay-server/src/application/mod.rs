//! Application layer: the connection state machines and the shared registry.
//!
//! Nothing in here touches a socket.  Connections are reached through
//! [`link::ConnectionHandle`] (outbound) and [`link::LineSource`] (inbound),
//! so every handler can be driven from tests with [`mock::ScriptedLines`].

pub mod admin_commands;
pub mod admin_handler;
pub mod device_handler;
pub mod link;
pub mod mock;
pub mod registry;
