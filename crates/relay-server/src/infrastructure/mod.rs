//! Infrastructure layer for relay-server.
//!
//! Everything that touches the outside world lives here:
//!
//! - Binding the four TCP listeners and running their accept loops
//! - Loading the certificate and key for the secure listeners
//! - Splitting each socket into a line reader and a writer task
//! - Reading the TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Session bookkeeping and broadcast (the application layer)
//! - Command grammar and telemetry patterns (`relay-core`)
//! - CLI parsing (that is done in `main.rs`)

pub mod network;
pub mod storage;

// Re-export the primary entry point so `main.rs` can call it concisely.
pub use network::run_server;
